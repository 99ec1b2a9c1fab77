/*
[INPUT]:  Public API exports for the shinami-zklogin crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod api;
pub mod auth_url;
pub mod callback;
pub mod client;
pub mod client_session;
pub mod config;
pub mod error;
pub mod local;
pub mod login;
pub mod oidc;
pub mod providers;
pub mod session;
pub mod tx;
pub mod user;
pub mod zk;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{AuthRouter, TxRouter};
pub use callback::{CallbackHandler, CallbackStatus};
pub use client::{AuthApiClient, AuthBackend};
pub use client_session::{ClientSession, load_client_session};
pub use crate::config::ZkLoginConfig;
pub use error::{ApiErrorBody, AuthError, CallbackError, Result, ZkLoginError};
pub use local::{LocalSession, LocalSessionStore, create_local_session};
pub use login::{AllowedApps, LoginHandler, LoginOutcome};
pub use providers::{
    EpochProvider, MaxEpochSource, SaltProvider, UserAuthorizer, ZkProofProvider, from_fn,
};
pub use session::{
    CookieSessionStore, MAX_EXPIRES_AT_MS, MemorySessionStore, Session, SessionStore, require_user,
};
pub use tx::{PreparedTransactionBytes, SignedTransactionBytes, TxExecHandler};
pub use user::{OidProvider, ZkLoginProof, ZkLoginRequest, ZkLoginUser, ZkLoginUserId};
