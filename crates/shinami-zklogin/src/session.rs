/*
[INPUT]:  Request cookie jars, session secret, epoch provider for the guard
[OUTPUT]: Server sessions holding the zkLogin user, response cookie jars
[POS]:    Server layer - authenticated session persistence and guard
[UPDATE]: When the cookie format or session expiry rules change
*/

use std::collections::HashMap;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ZkLoginError};
use crate::providers::EpochProvider;
use crate::user::ZkLoginUser;

pub const DEFAULT_COOKIE_NAME: &str = "zklogin_session";
pub const MIN_SECRET_LEN: usize = 32;
/// 9999-12-31T23:59:59Z, the last instant a cookie date can carry
pub const MAX_EXPIRES_AT_MS: u64 = 253_402_300_799_000;

const NONCE_LEN: usize = 12;

/// Pending change to write back with the response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionChange {
    #[default]
    Unchanged,
    Saved,
    Destroyed,
}

/// Session loaded for one request
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    user: Option<ZkLoginUser>,
    expires_at_ms: Option<u64>,
    change: SessionChange,
}

impl Session {
    pub fn empty() -> Self {
        Self::default()
    }

    fn loaded(id: Option<String>, user: ZkLoginUser, expires_at_ms: u64) -> Self {
        Self {
            id,
            user: Some(user),
            expires_at_ms: Some(expires_at_ms),
            change: SessionChange::Unchanged,
        }
    }

    pub fn user(&self) -> Option<&ZkLoginUser> {
        self.user.as_ref()
    }

    /// Unix millis after which the cookie is discarded
    pub fn expires_at_ms(&self) -> Option<u64> {
        self.expires_at_ms
    }

    pub fn change(&self) -> SessionChange {
        self.change
    }

    pub fn save(&mut self, user: ZkLoginUser, expires_at_ms: u64) {
        self.user = Some(user);
        self.expires_at_ms = Some(expires_at_ms);
        self.change = SessionChange::Saved;
    }

    pub fn destroy(&mut self) {
        self.user = None;
        self.expires_at_ms = None;
        self.change = SessionChange::Destroyed;
    }
}

/// Loads sessions from request cookies and writes pending changes back to the jar
pub trait SessionStore: Send + Sync {
    fn cookie_name(&self) -> &str;

    /// Anything unreadable or expired loads as an empty session
    fn load(&self, jar: &CookieJar) -> Session;

    /// Jar carrying the `Set-Cookie` for the pending change, if any
    fn commit(&self, session: &Session, jar: CookieJar) -> Result<CookieJar>;
}

fn now_ms() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or_default()
}

fn cookie_expiry(expires_at_ms: u64) -> OffsetDateTime {
    let nanos = i128::from(expires_at_ms.min(MAX_EXPIRES_AT_MS)) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[derive(Debug, Clone, Copy)]
struct CookieAttributes {
    secure: bool,
}

impl CookieAttributes {
    fn build(&self, name: &str, value: String) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    fn set(&self, jar: CookieJar, name: &str, value: String, expires_at_ms: u64) -> CookieJar {
        let mut cookie = self.build(name, value);
        cookie.set_expires(cookie_expiry(expires_at_ms));
        jar.add(cookie)
    }

    fn clear(&self, jar: CookieJar, name: &str) -> CookieJar {
        let mut cookie = self.build(name, String::new());
        cookie.make_removal();
        jar.add(cookie)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CookiePayload {
    user: ZkLoginUser,
    expires_at_ms: u64,
}

/// Whole session sealed into the cookie with AES-256-GCM
pub struct CookieSessionStore {
    cookie_name: String,
    cipher: Aes256Gcm,
    attributes: CookieAttributes,
}

impl std::fmt::Debug for CookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionStore")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl CookieSessionStore {
    pub fn new(cookie_name: impl Into<String>, secret: &str, secure: bool) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ZkLoginError::Session(format!(
                "session secret must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| ZkLoginError::Crypto("init aes-gcm".to_string()))?;

        Ok(Self {
            cookie_name: cookie_name.into(),
            cipher,
            attributes: CookieAttributes { secure },
        })
    }

    fn seal(&self, payload: &CookiePayload) -> Result<String> {
        let plaintext = serde_json::to_vec(payload)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| ZkLoginError::Crypto("encrypt session".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(combined))
    }

    fn unseal(&self, value: &str) -> Option<CookiePayload> {
        let data = URL_SAFE_NO_PAD.decode(value).ok()?;
        if data.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        serde_json::from_slice(&plaintext).ok()
    }
}

impl SessionStore for CookieSessionStore {
    fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn load(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Session::empty();
        };
        match self.unseal(cookie.value()) {
            Some(payload) if payload.expires_at_ms > now_ms() => {
                Session::loaded(None, payload.user, payload.expires_at_ms)
            }
            Some(_) => {
                debug!("session cookie expired");
                Session::empty()
            }
            None => {
                debug!("session cookie unreadable");
                Session::empty()
            }
        }
    }

    fn commit(&self, session: &Session, jar: CookieJar) -> Result<CookieJar> {
        match (session.change, &session.user, session.expires_at_ms) {
            (SessionChange::Saved, Some(user), Some(expires_at_ms)) => {
                let value = self.seal(&CookiePayload {
                    user: user.clone(),
                    expires_at_ms,
                })?;
                Ok(self.attributes.set(jar, &self.cookie_name, value, expires_at_ms))
            }
            (SessionChange::Destroyed, _, _) => Ok(self.attributes.clear(jar, &self.cookie_name)),
            _ => Ok(jar),
        }
    }
}

/// Sessions kept in process memory, keyed by a random cookie id
#[derive(Debug)]
pub struct MemorySessionStore {
    cookie_name: String,
    attributes: CookieAttributes,
    sessions: Mutex<HashMap<String, CookiePayload>>,
}

impl MemorySessionStore {
    pub fn new(cookie_name: impl Into<String>, secure: bool) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            attributes: CookieAttributes { secure },
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_NAME, false)
    }
}

impl SessionStore for MemorySessionStore {
    fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn load(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Session::empty();
        };
        let id = cookie.value();
        let mut sessions = self.sessions.lock();
        match sessions.get(id) {
            Some(payload) if payload.expires_at_ms > now_ms() => Session::loaded(
                Some(id.to_string()),
                payload.user.clone(),
                payload.expires_at_ms,
            ),
            Some(_) => {
                sessions.remove(id);
                Session::empty()
            }
            None => Session::empty(),
        }
    }

    fn commit(&self, session: &Session, jar: CookieJar) -> Result<CookieJar> {
        let mut sessions = self.sessions.lock();
        let now = now_ms();
        let before = sessions.len();
        sessions.retain(|_, payload| payload.expires_at_ms > now);
        if sessions.len() < before {
            debug!(pruned = before - sessions.len(), "expired sessions pruned");
        }

        match (session.change, &session.user, session.expires_at_ms) {
            (SessionChange::Saved, Some(user), Some(expires_at_ms)) => {
                let id = session
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                sessions.insert(
                    id.clone(),
                    CookiePayload {
                        user: user.clone(),
                        expires_at_ms,
                    },
                );
                Ok(self.attributes.set(jar, &self.cookie_name, id, expires_at_ms))
            }
            (SessionChange::Destroyed, _, _) => {
                if let Some(id) = &session.id {
                    sessions.remove(id);
                }
                Ok(self.attributes.clear(jar, &self.cookie_name))
            }
            _ => Ok(jar),
        }
    }
}

/// User of a live session; destroys sessions past their max epoch
pub async fn require_user(session: &mut Session, epochs: &dyn EpochProvider) -> Result<ZkLoginUser> {
    let Some(user) = session.user().cloned() else {
        return Err(ZkLoginError::Unauthorized);
    };

    let current = epochs.current_epoch().await?;
    if current.epoch > user.max_epoch {
        info!(
            wallet = %user.wallet,
            epoch = current.epoch,
            max_epoch = user.max_epoch,
            "session past max epoch, destroying"
        );
        session.destroy();
        return Err(ZkLoginError::SessionExpired);
    }
    Ok(user)
}
