/*
[INPUT]:  Aptos service submodules
[OUTPUT]: Public Aptos client surface; Movement networks use the same clients
          through their URL-override constructors
[POS]:    Aptos service clients - module wiring and re-exports
[UPDATE]: When adding Aptos services or changing exports
*/

pub mod gas;
pub mod transaction;
pub mod wallet;

pub use gas::{Fund, GasStationClient};
pub use transaction::{AccountSignature, AptosTransaction};
pub use wallet::{KeyClient, ShinamiWalletSigner, WalletClient};
