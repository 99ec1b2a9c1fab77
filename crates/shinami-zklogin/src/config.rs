/*
[INPUT]:  YAML configuration file, SHINAMI__* environment overrides
[OUTPUT]: Parsed zkLogin configuration and the clients/stores built from it
[POS]:    Configuration layer - loaded once at startup, passed to constructors
[UPDATE]: When adding configuration options
*/

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use shinami_clients::sui::{GasStationClient, NodeClient, ZkProverClient, ZkWalletClient};
use shinami_clients::{Chain, ClientConfig, Region, Service, regional_api_url, url_for_access_key};

use crate::error::{Result, ZkLoginError};
use crate::local::FileLocalSessionStore;
use crate::login::{AllowedApps, LoginHandler};
use crate::oidc::{DEFAULT_JWKS_TTL, DEFAULT_REFRESH_COOLDOWN, JwksCache};
use crate::session::{CookieSessionStore, DEFAULT_COOKIE_NAME};
use crate::user::OidProvider;

/// Prefix of environment overrides, e.g. `SHINAMI__SESSION__SECRET`
pub const ENV_PREFIX: &str = "SHINAMI";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZkLoginConfig {
    /// Shinami access keys per service
    #[serde(default)]
    pub access_keys: AccessKeys,
    /// Region for all services; inferred from each access key when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Full service URLs, overriding region-based ones
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub session: SessionConfig,
    /// Provider name to accepted OAuth client ids
    #[serde(default)]
    pub allowed_apps: HashMap<String, Vec<String>>,
    /// Where the client keeps its local session
    #[serde(default)]
    pub local_session_path: Option<PathBuf>,
    #[serde(default = "default_auth_api_base")]
    pub auth_api_base: String,
    /// Epochs past the current one that a new local session stays valid
    #[serde(default = "default_max_epoch_offset")]
    pub max_epoch_offset: u64,
    #[serde(default = "default_jwks_ttl_secs")]
    pub jwks_ttl_secs: u64,
    /// Minimum spacing of key set refetches forced by unknown key ids
    #[serde(default = "default_jwks_refresh_cooldown_secs")]
    pub jwks_refresh_cooldown_secs: u64,
    /// Listen address of `serve`
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessKeys {
    pub node: Option<String>,
    pub gas: Option<String>,
    /// Used for both zkwallet and zkprover
    pub wallet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Endpoints {
    pub node: Option<String>,
    pub gas: Option<String>,
    pub zkwallet: Option<String>,
    pub zkprover: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Cookie encryption secret, at least 32 characters
    #[serde(default)]
    pub secret: Option<String>,
    /// Mark the cookie `Secure`
    #[serde(default)]
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secret: None,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_auth_api_base() -> String {
    "http://localhost:3000/api/auth".to_string()
}

fn default_max_epoch_offset() -> u64 {
    2
}

fn default_jwks_ttl_secs() -> u64 {
    DEFAULT_JWKS_TTL.as_secs()
}

fn default_jwks_refresh_cooldown_secs() -> u64 {
    DEFAULT_REFRESH_COOLDOWN.as_secs()
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn missing(what: &str) -> ZkLoginError {
    ZkLoginError::InvalidRequest(format!("{what} not configured"))
}

impl ZkLoginConfig {
    /// Load from a YAML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse YAML text, then apply environment overrides
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(env_source())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
        }
    }

    fn region(&self) -> Result<Option<Region>> {
        self.region
            .as_deref()
            .map(|region| {
                region
                    .parse::<Region>()
                    .map_err(|err| ZkLoginError::InvalidRequest(err.to_string()))
            })
            .transpose()
    }

    fn service_url(&self, override_url: Option<&String>, access_key: &str, service: Service) -> Result<String> {
        if let Some(url) = override_url {
            return Ok(url.clone());
        }
        Ok(match self.region()? {
            Some(region) => regional_api_url(region, Chain::Sui, service),
            None => url_for_access_key(access_key, Chain::Sui, service),
        })
    }

    /// Allowed apps keyed by provider; unknown provider names are rejected
    pub fn allowed_apps(&self) -> Result<AllowedApps> {
        self.allowed_apps
            .iter()
            .map(|(provider, apps)| Ok((provider.parse::<OidProvider>()?, apps.clone())))
            .collect()
    }

    pub fn local_session_path(&self) -> PathBuf {
        self.local_session_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shinami-zklogin")
                .join("session.json")
        })
    }

    pub fn local_session_store(&self) -> FileLocalSessionStore {
        FileLocalSessionStore::new(self.local_session_path())
    }

    pub fn node_client(&self) -> Result<NodeClient> {
        let key = self.access_keys.node.as_deref().ok_or_else(|| missing("access_keys.node"))?;
        let url = self.service_url(self.endpoints.node.as_ref(), key, Service::Node)?;
        Ok(NodeClient::with_config(key, &url, self.client_config())?)
    }

    pub fn gas_client(&self) -> Result<GasStationClient> {
        let key = self.access_keys.gas.as_deref().ok_or_else(|| missing("access_keys.gas"))?;
        let url = self.service_url(self.endpoints.gas.as_ref(), key, Service::Gas)?;
        Ok(GasStationClient::with_config(key, &url, self.client_config())?)
    }

    pub fn zkwallet_client(&self) -> Result<ZkWalletClient> {
        let key = self.access_keys.wallet.as_deref().ok_or_else(|| missing("access_keys.wallet"))?;
        let url = self.service_url(self.endpoints.zkwallet.as_ref(), key, Service::ZkWallet)?;
        Ok(ZkWalletClient::with_config(key, &url, self.client_config())?)
    }

    pub fn zkprover_client(&self) -> Result<ZkProverClient> {
        let key = self.access_keys.wallet.as_deref().ok_or_else(|| missing("access_keys.wallet"))?;
        let url = self.service_url(self.endpoints.zkprover.as_ref(), key, Service::ZkProver)?;
        Ok(ZkProverClient::with_config(key, &url, self.client_config())?)
    }

    pub fn session_store(&self) -> Result<CookieSessionStore> {
        let secret = self.session.secret.as_deref().ok_or_else(|| missing("session.secret"))?;
        CookieSessionStore::new(&self.session.cookie_name, secret, self.session.secure)
    }

    pub fn jwks_cache(&self) -> Result<JwksCache> {
        let config = self.client_config();
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(JwksCache::new(http_client, Duration::from_secs(self.jwks_ttl_secs))
            .with_refresh_cooldown(Duration::from_secs(self.jwks_refresh_cooldown_secs)))
    }

    /// Login handler backed by the Shinami node, zkwallet and zkprover
    pub fn login_handler(&self) -> Result<LoginHandler> {
        Ok(LoginHandler::new(
            Arc::new(self.node_client()?),
            Arc::new(self.zkwallet_client()?),
            Arc::new(self.zkprover_client()?),
            Arc::new(self.jwks_cache()?),
            self.allowed_apps()?,
        ))
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
