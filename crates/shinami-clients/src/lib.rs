/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Shinami client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod aptos;
pub mod encoding;
pub mod region;
pub mod rpc;
pub mod session;
pub mod sui;

pub use region::{Chain, Region, Service, regional_api_url, url_for_access_key};

pub use rpc::{
    ClientConfig,
    ErrorDetails,
    Result,
    ShinamiError,
    ShinamiRpcClient,
    trim_trailing_params,
};

pub use session::{KeySession, SessionIssuer};
