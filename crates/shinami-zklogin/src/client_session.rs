/*
[INPUT]:  Server user from `me`, client-local session
[OUTPUT]: Combined client session state: loading, active or inactive
[POS]:    Client layer - what the app renders as "logged in"
[UPDATE]: When the conditions for an active session change
*/

use tokio::sync::watch;
use tracing::debug;

use crate::client::AuthBackend;
use crate::error::Result;
use crate::local::{LocalSession, LocalSessionStore};
use crate::user::ZkLoginUser;

#[derive(Debug, Clone, Default)]
pub enum ClientSession {
    #[default]
    Loading,
    /// Server user logged in with this device's local session
    Active {
        user: ZkLoginUser,
        local_session: LocalSession,
    },
    Inactive,
}

impl ClientSession {
    /// `Active` only when the user's token was issued for the local nonce
    pub fn resolve(user: Option<ZkLoginUser>, local_session: Option<LocalSession>) -> Self {
        match (user, local_session) {
            (Some(user), Some(local_session))
                if user.jwt_nonce() == Some(local_session.nonce.as_str()) =>
            {
                ClientSession::Active {
                    user,
                    local_session,
                }
            }
            _ => ClientSession::Inactive,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ClientSession::Loading)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ClientSession::Active { .. })
    }

    pub fn user(&self) -> Option<&ZkLoginUser> {
        match self {
            ClientSession::Active { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn local_session(&self) -> Option<&LocalSession> {
        match self {
            ClientSession::Active { local_session, .. } => Some(local_session),
            _ => None,
        }
    }
}

/// Fetch the server user and local session, then resolve them
pub async fn load_client_session(
    backend: &dyn AuthBackend,
    store: &dyn LocalSessionStore,
) -> Result<ClientSession> {
    let user = backend.me().await?;
    // An unreadable local record counts as no session
    let local_session = store.load().unwrap_or_else(|err| {
        debug!(error = %err, "ignoring unreadable local session");
        None
    });
    Ok(ClientSession::resolve(user, local_session))
}

/// Publishes the current client session to watchers
#[derive(Debug)]
pub struct ClientSessionWatch {
    tx: watch::Sender<ClientSession>,
}

impl Default for ClientSessionWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSessionWatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ClientSession::Loading);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientSession> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ClientSession {
        self.tx.borrow().clone()
    }

    /// Reload and publish; on error the previous value stays
    pub async fn refresh(
        &self,
        backend: &dyn AuthBackend,
        store: &dyn LocalSessionStore,
    ) -> Result<ClientSession> {
        let session = load_client_session(backend, store).await?;
        self.tx.send_replace(session.clone());
        Ok(session)
    }
}
