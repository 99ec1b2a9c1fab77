/*
[INPUT]:  OpenID identity tokens and provider key set endpoints
[OUTPUT]: Signature-verified JWT claims with the zkLogin required fields
[POS]:    Auth layer - OpenID token verification and JWKS caching
[UPDATE]: When adding signing algorithms, providers or cache policy changes
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jwt_simple::prelude::*;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AuthError, Result, ZkLoginError};
use crate::user::OidProvider;

/// Default lifetime of a fetched key set
pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(3600);
/// Minimum age of a cached key set before a forced refresh refetches it
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// One public key from a provider's JWKS document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus, base64url
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent, base64url
    #[serde(default)]
    pub e: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Key matching `kid`; without a `kid` only a single-key set matches
    pub fn find(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|key| key.kid.as_deref() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

/// Where provider key sets come from
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Key set for `provider`; `refresh` asks for a newer set than the cached one
    async fn key_set(&self, provider: OidProvider, refresh: bool) -> Result<Arc<JwkSet>>;
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Remote JWKS fetcher with a per-provider TTL cache
#[derive(Debug)]
pub struct JwksCache {
    http_client: reqwest::Client,
    ttl: Duration,
    refresh_cooldown: Duration,
    urls: HashMap<OidProvider, String>,
    entries: RwLock<HashMap<OidProvider, CachedKeySet>>,
}

impl JwksCache {
    pub fn new(http_client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            http_client,
            ttl,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            urls: HashMap::new(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch `provider`'s keys from `url` instead of its published endpoint
    pub fn with_url(mut self, provider: OidProvider, url: impl Into<String>) -> Self {
        self.urls.insert(provider, url.into());
        self
    }

    /// Forced refreshes within `cooldown` of the last fetch reuse the cached set
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    fn url_for(&self, provider: OidProvider) -> &str {
        self.urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.jwks_url())
    }

    fn cached(&self, provider: OidProvider, max_age: Duration) -> Option<Arc<JwkSet>> {
        let entries = self.entries.read();
        entries
            .get(&provider)
            .filter(|entry| entry.fetched_at.elapsed() < max_age)
            .map(|entry| entry.keys.clone())
    }

    async fn fetch(&self, provider: OidProvider) -> Result<Arc<JwkSet>> {
        let url = self.url_for(provider);
        debug!(provider = %provider, url, "fetching key set");
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ZkLoginError::Internal(format!(
                "key set fetch for {provider} failed with status {status}"
            )));
        }
        let keys = Arc::new(response.json::<JwkSet>().await?);
        self.entries.write().insert(
            provider,
            CachedKeySet {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

#[async_trait]
impl KeySetSource for JwksCache {
    async fn key_set(&self, provider: OidProvider, refresh: bool) -> Result<Arc<JwkSet>> {
        let max_age = if refresh {
            self.refresh_cooldown.min(self.ttl)
        } else {
            self.ttl
        };
        if let Some(keys) = self.cached(provider, max_age) {
            if refresh {
                debug!(provider = %provider, "key set refreshed recently, reusing");
            }
            return Ok(keys);
        }
        self.fetch(provider).await
    }
}

/// Fixed key sets, for offline use
#[derive(Debug, Clone, Default)]
pub struct StaticKeySet {
    sets: HashMap<OidProvider, Arc<JwkSet>>,
}

impl StaticKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, provider: OidProvider, keys: JwkSet) -> Self {
        self.sets.insert(provider, Arc::new(keys));
        self
    }
}

#[async_trait]
impl KeySetSource for StaticKeySet {
    async fn key_set(&self, provider: OidProvider, _refresh: bool) -> Result<Arc<JwkSet>> {
        Ok(self.sets.get(&provider).cloned().unwrap_or_default())
    }
}

/// Identity token whose signature and required claims checked out
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedJwt {
    pub claims: Value,
    pub iss: String,
    /// First audience when the token carries several
    pub aud: String,
    pub nonce: String,
    pub key_claim_value: String,
}

/// Verify `jwt` against `provider`'s keys and extract the zkLogin claims.
///
/// Unknown key ids trigger one key set refresh, subject to the source's
/// refresh cooldown. Key set fetch failures
/// propagate; every token problem is [`AuthError::BadJwt`].
pub async fn verify_jwt(
    keys: &dyn KeySetSource,
    provider: OidProvider,
    jwt: &str,
    key_claim_name: &str,
) -> Result<VerifiedJwt> {
    let metadata = Token::decode_metadata(jwt).map_err(|_| AuthError::BadJwt)?;
    let kid = metadata.key_id();

    let mut set = keys.key_set(provider, false).await?;
    if set.find(kid).is_none() {
        debug!(provider = %provider, kid = ?kid, "unknown key id, refreshing key set");
        set = keys.key_set(provider, true).await?;
    }
    let Some(jwk) = set.find(kid) else {
        warn!(provider = %provider, kid = ?kid, "no key for token");
        return Err(AuthError::BadJwt.into());
    };

    verify_signature(jwk, metadata.algorithm(), jwt)?;
    let claims = decode_payload(jwt)?;
    extract_claims(claims, key_claim_name)
}

fn decode_component(value: Option<&str>) -> std::result::Result<Vec<u8>, AuthError> {
    let value = value.ok_or(AuthError::BadJwt)?;
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|_| AuthError::BadJwt)
}

fn verify_signature(jwk: &Jwk, algorithm: &str, jwt: &str) -> std::result::Result<(), AuthError> {
    if jwk.kty != "RSA" {
        return Err(AuthError::BadJwt);
    }
    let n = decode_component(jwk.n.as_deref())?;
    let e = decode_component(jwk.e.as_deref())?;

    let verified = match algorithm {
        "RS256" => RS256PublicKey::from_components(&n, &e)
            .and_then(|key| key.verify_token::<NoCustomClaims>(jwt, None)),
        "RS384" => RS384PublicKey::from_components(&n, &e)
            .and_then(|key| key.verify_token::<NoCustomClaims>(jwt, None)),
        "RS512" => RS512PublicKey::from_components(&n, &e)
            .and_then(|key| key.verify_token::<NoCustomClaims>(jwt, None)),
        other => {
            warn!(algorithm = other, "unsupported token algorithm");
            return Err(AuthError::BadJwt);
        }
    };

    verified.map(|_| ()).map_err(|err| {
        debug!(error = %err, "token verification failed");
        AuthError::BadJwt
    })
}

/// Claims of a JWT, without verifying anything
pub fn decode_payload(jwt: &str) -> std::result::Result<Value, AuthError> {
    let payload = jwt.split('.').nth(1).ok_or(AuthError::BadJwt)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::BadJwt)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::BadJwt)
}

fn string_claim(claims: &Value, name: &str) -> std::result::Result<String, AuthError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AuthError::BadJwt)
}

fn first_audience(claims: &Value) -> std::result::Result<String, AuthError> {
    match claims.get("aud") {
        Some(Value::String(aud)) => Ok(aud.clone()),
        Some(Value::Array(auds)) => auds
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AuthError::BadJwt),
        _ => Err(AuthError::BadJwt),
    }
}

fn extract_claims(claims: Value, key_claim_name: &str) -> Result<VerifiedJwt> {
    Ok(VerifiedJwt {
        iss: string_claim(&claims, "iss")?,
        aud: first_audience(&claims)?,
        nonce: string_claim(&claims, "nonce")?,
        key_claim_value: string_claim(&claims, key_claim_name)?,
        claims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::OnceLock;

    fn key_pair() -> &'static RS256KeyPair {
        static KEY: OnceLock<RS256KeyPair> = OnceLock::new();
        KEY.get_or_init(|| {
            RS256KeyPair::generate(2048)
                .unwrap()
                .with_key_id("test-kid")
        })
    }

    fn jwk_set() -> JwkSet {
        let components = key_pair().public_key().to_components();
        JwkSet {
            keys: vec![Jwk {
                kty: "RSA".into(),
                kid: Some("test-kid".into()),
                alg: Some("RS256".into()),
                key_use: Some("sig".into()),
                n: Some(URL_SAFE_NO_PAD.encode(components.n)),
                e: Some(URL_SAFE_NO_PAD.encode(components.e)),
            }],
        }
    }

    fn token(nonce: Option<&str>) -> String {
        let mut claims = Claims::create(jwt_simple::prelude::Duration::from_hours(1))
            .with_issuer("https://accounts.google.com")
            .with_audience("app-1")
            .with_subject("user-1");
        if let Some(nonce) = nonce {
            claims = claims.with_nonce(nonce);
        }
        key_pair().sign(claims).unwrap()
    }

    fn source() -> StaticKeySet {
        StaticKeySet::new().with_keys(OidProvider::Google, jwk_set())
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let verified = verify_jwt(&source(), OidProvider::Google, &token(Some("n1")), "sub")
            .await
            .unwrap();
        assert_eq!(verified.iss, "https://accounts.google.com");
        assert_eq!(verified.aud, "app-1");
        assert_eq!(verified.nonce, "n1");
        assert_eq!(verified.key_claim_value, "user-1");
        assert_eq!(verified.claims["sub"], "user-1");
    }

    #[tokio::test]
    async fn test_missing_nonce_is_bad_jwt() {
        let err = verify_jwt(&source(), OidProvider::Google, &token(None), "sub")
            .await
            .unwrap_err();
        assert!(matches!(err, ZkLoginError::Auth(AuthError::BadJwt)));
    }

    #[tokio::test]
    async fn test_missing_key_claim_is_bad_jwt() {
        let err = verify_jwt(&source(), OidProvider::Google, &token(Some("n1")), "email")
            .await
            .unwrap_err();
        assert!(matches!(err, ZkLoginError::Auth(AuthError::BadJwt)));
    }

    #[tokio::test]
    async fn test_unknown_provider_keys_is_bad_jwt() {
        let err = verify_jwt(&source(), OidProvider::Twitch, &token(Some("n1")), "sub")
            .await
            .unwrap_err();
        assert!(matches!(err, ZkLoginError::Auth(AuthError::BadJwt)));
    }

    #[tokio::test]
    async fn test_tampered_token_is_bad_jwt() {
        let jwt = token(Some("n1"));
        let mut parts: Vec<&str> = jwt.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({
                "iss": "https://accounts.google.com",
                "aud": "app-1",
                "sub": "someone-else",
                "nonce": "n1",
            }))
            .unwrap(),
        );
        parts[1] = &forged;
        let err = verify_jwt(&source(), OidProvider::Google, &parts.join("."), "sub")
            .await
            .unwrap_err();
        assert!(matches!(err, ZkLoginError::Auth(AuthError::BadJwt)));
    }

    #[test]
    fn test_first_audience_of_array() {
        let claims = json!({ "aud": ["a", "b"] });
        assert_eq!(first_audience(&claims).unwrap(), "a");
        assert!(first_audience(&json!({ "aud": [] })).is_err());
    }

    #[test]
    fn test_find_without_kid() {
        let set = jwk_set();
        assert!(set.find(None).is_some());
        assert!(set.find(Some("other")).is_none());
    }
}
