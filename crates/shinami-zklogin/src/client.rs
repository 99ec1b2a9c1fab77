/*
[INPUT]:  Auth API base URL, login requests, local session for tx signing
[OUTPUT]: AuthBackend trait and an HTTP client for the auth and tx routes
[POS]:    Client layer - talks to the server routes with a cookie jar
[UPDATE]: When route paths or the error body format change
*/

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shinami_clients::ClientConfig;
use tracing::{debug, info};
use url::Url;

use crate::error::{ApiErrorBody, Result, ZkLoginError};
use crate::local::LocalSession;
use crate::tx::{PreparedTransactionBytes, SignedTransactionBytes};
use crate::user::{ZkLoginRequest, ZkLoginUser};

/// Server side of the login protocol as seen by a client
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, request: &ZkLoginRequest) -> Result<ZkLoginUser>;
    async fn logout(&self) -> Result<()>;
    /// `None` when there is no authenticated session
    async fn me(&self) -> Result<Option<ZkLoginUser>>;
}

/// JSON client for the auth routes; keeps the session cookie between calls
#[derive(Debug, Clone)]
pub struct AuthApiClient {
    http_client: Client,
    auth_base: Url,
}

impl AuthApiClient {
    pub fn new(auth_base: &str) -> Result<Self> {
        Self::with_config(auth_base, &ClientConfig::default())
    }

    pub fn with_config(auth_base: &str, config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = auth_base.trim_end_matches('/').to_string();
        base.push('/');
        let auth_base = Url::parse(&base)
            .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad auth API URL: {err}")))?;

        Ok(Self {
            http_client,
            auth_base,
        })
    }

    pub fn auth_base(&self) -> &Url {
        &self.auth_base
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.auth_base
            .join(path)
            .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad API path {path}: {err}")))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            let error = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(ZkLoginError::Api {
                status: status.as_u16(),
                error,
            });
        }
        Ok(response.json().await?)
    }

    /// POST a JSON body to `path`, relative to the auth base or absolute
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        debug!(url = %url, "POST");
        let response = self.http_client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.resolve(path)?;
        debug!(url = %url, "GET");
        let response = self.http_client.get(url).send().await?;
        Self::decode(response).await
    }

    /// Prepare, sign locally and execute through a `{tx_base}/tx` and
    /// `{tx_base}/exec` route pair.
    pub async fn execute_tx<B, T>(&self, tx_base: &str, body: &B, session: &LocalSession) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let tx_base = tx_base.trim_end_matches('/');
        let prepared: PreparedTransactionBytes =
            self.post_json(&format!("{tx_base}/tx"), body).await?;
        let signature = session.sign_transaction(&prepared.tx_bytes)?;
        let signed = SignedTransactionBytes {
            tx_bytes: prepared.tx_bytes,
            gas_signature: prepared.gas_signature,
            signature,
        };
        self.post_json(&format!("{tx_base}/exec"), &signed).await
    }
}

#[async_trait]
impl AuthBackend for AuthApiClient {
    async fn login(&self, request: &ZkLoginRequest) -> Result<ZkLoginUser> {
        let user: ZkLoginUser = self.post_json("login", request).await?;
        info!(wallet = %user.wallet, provider = %user.oid_provider, "logged in");
        Ok(user)
    }

    async fn logout(&self) -> Result<()> {
        let _: Value = self.post_json("logout", &json!({})).await?;
        Ok(())
    }

    async fn me(&self) -> Result<Option<ZkLoginUser>> {
        match self.get_json("me").await {
            Ok(user) => Ok(Some(user)),
            Err(ZkLoginError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED.as_u16() => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
