/*
[INPUT]:  RPC submodules (client, error, params)
[OUTPUT]: Public JSON-RPC transport API surface
[POS]:    RPC layer - module wiring and re-exports
[UPDATE]: When adding RPC modules or changing exports
*/

pub mod client;
pub mod error;
pub mod params;

pub use client::{ClientConfig, ShinamiRpcClient};
pub use error::{ErrorDetails, INVALID_PARAMS_CODE, Result, ShinamiError};
pub use params::trim_trailing_params;
