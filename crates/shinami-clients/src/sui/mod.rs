/*
[INPUT]:  Sui service submodules
[OUTPUT]: Public Sui client surface
[POS]:    Sui service clients - module wiring and re-exports
[UPDATE]: When adding Sui services or changing exports
*/

pub mod gas;
pub mod node;
pub mod wallet;
pub mod zkprover;
pub mod zkwallet;

pub use gas::{
    Fund, GasStationClient, GaslessTransaction, SponsorCost, SponsoredTransaction,
    SponsoredTransactionStatus,
};
pub use node::{
    EpochInfo, ExecutionStatus, NodeClient, TransactionBlockResponse, TransactionEffects,
};
pub use wallet::{
    ExecuteTransactionRequestType, KeyClient, ShinamiWalletSigner, SignTransactionResult,
    WalletClient,
};
pub use zkprover::{IssBase64Details, PartialZkLoginProof, ProofPoints, ZkProverClient};
pub use zkwallet::{ZkLoginUserId, ZkLoginWallet, ZkWalletClient};
