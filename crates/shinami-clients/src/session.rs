/*
[INPUT]:  Long-lived wallet secret and a session-issuing key service client
[OUTPUT]: Cached session token, refreshed once when the service reports it stale
[POS]:    Auth layer - session token lifecycle shared by Sui and Aptos wallets
[UPDATE]: When token issuance or expiry detection changes
*/

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::rpc::Result;

/// Anything that can turn a wallet secret into a short-lived session token
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn create_session(&self, secret: &str) -> Result<String>;
}

#[async_trait]
impl<T: SessionIssuer + ?Sized> SessionIssuer for Arc<T> {
    async fn create_session(&self, secret: &str) -> Result<String> {
        (**self).create_session(secret).await
    }
}

/// A secret session with a Shinami key service.
///
/// Clones share the cached token.
#[derive(Clone)]
pub struct KeySession<I> {
    secret: Arc<str>,
    issuer: I,
    token: Arc<RwLock<Option<String>>>,
}

impl<I> fmt::Debug for KeySession<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySession")
            .field("has_token", &self.token.read().is_some())
            .finish_non_exhaustive()
    }
}

impl<I: SessionIssuer> KeySession<I> {
    /// Create a session with no cached token
    pub fn new(secret: impl Into<String>, issuer: I) -> Self {
        Self {
            secret: Arc::from(secret.into()),
            issuer,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Key service client backing this session
    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    /// Currently cached token, if any
    pub fn cached_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Issue a new token from the secret, replacing any cached one
    pub async fn refresh_token(&self) -> Result<String> {
        let token = self.issuer.create_session(&self.secret).await?;
        *self.token.write() = Some(token.clone());
        debug!("session token refreshed");
        Ok(token)
    }

    /// Run `action` with a valid token.
    ///
    /// A freshly issued token is used as is. A cached token that the service
    /// rejects as a bad session token is refreshed once and `action` retried
    /// once; every other failure propagates unchanged.
    pub async fn with_token<T, F, Fut>(&self, action: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cached = self.cached_token();
        let Some(token) = cached else {
            let token = self.refresh_token().await?;
            return action(token).await;
        };

        match action(token).await {
            Err(err) if err.is_bad_session_token() => {
                warn!("session token rejected, refreshing");
                let token = self.refresh_token().await?;
                action(token).await
            }
            other => other,
        }
    }
}
