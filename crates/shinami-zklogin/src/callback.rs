/*
[INPUT]:  Provider redirect URL, local session store, auth backend
[OUTPUT]: Post-login redirect path, observable callback status
[POS]:    Client layer - completes the OpenID redirect by logging in
[UPDATE]: When provider callback formats or status rules change
*/

use std::sync::Arc;

use tokio::sync::watch;
use percent_encoding::percent_decode_str;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::client::AuthBackend;
use crate::error::CallbackError;
use crate::local::LocalSessionStore;
use crate::user::{DEFAULT_KEY_CLAIM_NAME, OidProvider, ZkLoginRequest};

/// Progress of one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackStatus {
    Loading,
    LoggingIn,
    Redirecting,
    Error,
}

impl CallbackStatus {
    pub fn can_transition_to(self, next: CallbackStatus) -> bool {
        matches!(
            (self, next),
            (CallbackStatus::Loading, CallbackStatus::LoggingIn)
                | (CallbackStatus::Loading, CallbackStatus::Error)
                | (CallbackStatus::LoggingIn, CallbackStatus::Redirecting)
                | (CallbackStatus::LoggingIn, CallbackStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CallbackStatus::Redirecting | CallbackStatus::Error)
    }
}

/// Validated status transitions, published on a watch channel
#[derive(Debug)]
struct StatusMachine {
    history: Vec<CallbackStatus>,
    tx: watch::Sender<CallbackStatus>,
}

impl StatusMachine {
    fn new() -> Self {
        let (tx, _) = watch::channel(CallbackStatus::Loading);
        Self {
            history: vec![CallbackStatus::Loading],
            tx,
        }
    }

    fn state(&self) -> CallbackStatus {
        *self.tx.borrow()
    }

    fn transition(&mut self, next: CallbackStatus) -> Result<(), CallbackError> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(CallbackError::InvalidTransition { from, to: next });
        }
        self.history.push(next);
        self.tx.send_replace(next);
        Ok(())
    }
}

/// `state` decoded from the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackState {
    pub nonce: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: CallbackState,
    pub id_token: Option<String>,
}

/// Parse the fragment of a provider callback URL
pub fn parse_callback_url(url: &str, provider: OidProvider) -> Result<CallbackParams, CallbackError> {
    let Some((_, fragment)) = url.split_once('#') else {
        return Err(CallbackError::BadState("Missing params from callback".to_string()));
    };
    let param = |name: &str| {
        form_urlencoded::parse(fragment.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    let mut state = param("state")
        .ok_or_else(|| CallbackError::BadState("Missing state from params".to_string()))?;
    // Twitch encodes state a second time
    if provider == OidProvider::Twitch {
        state = percent_decode(&state)?;
    }

    let state_param = |name: &str| {
        form_urlencoded::parse(state.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    let nonce = state_param("nonce")
        .ok_or_else(|| CallbackError::BadState("Missing nonce from state".to_string()))?;
    let redirect_to = state_param("redirectTo")
        .ok_or_else(|| CallbackError::BadState("Missing redirectTo from state".to_string()))?;

    Ok(CallbackParams {
        state: CallbackState { nonce, redirect_to },
        id_token: param("id_token"),
    })
}

/// `%XX` decoding only; `+` and stray `%` stay as is
fn percent_decode(value: &str) -> Result<String, CallbackError> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CallbackError::BadState("Bad percent-encoding in state".to_string()))
}

/// Completes one provider callback; single use
pub struct CallbackHandler {
    provider: OidProvider,
    key_claim_name: String,
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn LocalSessionStore>,
    machine: StatusMachine,
}

impl CallbackHandler {
    pub fn new(
        provider: OidProvider,
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn LocalSessionStore>,
    ) -> Self {
        Self {
            provider,
            key_claim_name: DEFAULT_KEY_CLAIM_NAME.to_string(),
            backend,
            store,
            machine: StatusMachine::new(),
        }
    }

    pub fn with_key_claim_name(mut self, key_claim_name: impl Into<String>) -> Self {
        self.key_claim_name = key_claim_name.into();
        self
    }

    pub fn status(&self) -> CallbackStatus {
        self.machine.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<CallbackStatus> {
        self.machine.tx.subscribe()
    }

    /// Every status entered so far, starting with `Loading`
    pub fn history(&self) -> &[CallbackStatus] {
        &self.machine.history
    }

    /// Log in with the callback's token; returns the path to open next
    pub async fn handle(&mut self, callback_url: &str) -> Result<String, CallbackError> {
        let status = self.status();
        if status != CallbackStatus::Loading {
            return Err(CallbackError::InvalidTransition {
                from: status,
                to: CallbackStatus::LoggingIn,
            });
        }

        match self.run(callback_url).await {
            Ok(redirect_to) => Ok(redirect_to),
            Err(err) => {
                warn!(provider = %self.provider, error = %err, "callback failed");
                self.machine.transition(CallbackStatus::Error)?;
                Err(err)
            }
        }
    }

    async fn run(&mut self, callback_url: &str) -> Result<String, CallbackError> {
        let session = self
            .store
            .load()
            .map_err(CallbackError::LocalSession)?
            .ok_or(CallbackError::NoLocalSession)?;

        let params = parse_callback_url(callback_url, self.provider)?;
        if params.state.nonce != session.nonce {
            return Err(CallbackError::BadNonce);
        }
        let jwt = params.id_token.ok_or(CallbackError::MissingIdToken)?;

        self.machine.transition(CallbackStatus::LoggingIn)?;
        let user = self
            .backend
            .login(&ZkLoginRequest {
                oid_provider: self.provider,
                jwt,
                extended_ephemeral_public_key: session.extended_public_key_base64(),
                max_epoch: session.max_epoch,
                jwt_randomness: session.jwt_randomness.to_string(),
                key_claim_name: Some(self.key_claim_name.clone()),
            })
            .await?;

        self.machine.transition(CallbackStatus::Redirecting)?;
        info!(provider = %self.provider, wallet = %user.wallet, "callback complete");
        Ok(params.state.redirect_to)
    }
}
