/*
[INPUT]:  Access key, service URL, timeouts
[OUTPUT]: JSON-RPC 2.0 client that decodes typed results
[POS]:    RPC layer - core transport shared by every Shinami service client
[UPDATE]: When adding connection options or changing the wire protocol
*/

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::error::{Result, ShinamiError};

const ACCESS_KEY_HEADER: &str = "X-API-Key";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Base JSON-RPC client for Shinami services
#[derive(Clone)]
pub struct ShinamiRpcClient {
    http_client: Client,
    url: Url,
    access_key: String,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for ShinamiRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShinamiRpcClient")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl ShinamiRpcClient {
    /// Create a new client with default configuration
    pub fn new(access_key: impl Into<String>, url: &str) -> Result<Self> {
        Self::with_config(access_key, url, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(
        access_key: impl Into<String>,
        url: &str,
        config: ClientConfig,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: Url::parse(url)?,
            access_key: access_key.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Service URL this client talks to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue an RPC request and decode its result.
    ///
    /// `params` may be positional (a JSON array) or by name (a JSON object).
    pub async fn request<T, P>(&self, method: &str, params: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, url = %self.url, "rpc request");
        let response = self
            .http_client
            .post(self.url.clone())
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let payload: Value = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(ShinamiError::api_error(status, text));
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(error) = payload.get("error").filter(|error| !error.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            debug!(method, id, code, message = %message, "rpc error");
            return Err(ShinamiError::Rpc {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }

        if !status.is_success() {
            return Err(ShinamiError::api_error(status, text));
        }

        let result = match payload {
            Value::Object(mut map) => map.remove("result").ok_or_else(|| {
                ShinamiError::InvalidResponse(format!("{method}: missing result"))
            })?,
            _ => {
                return Err(ShinamiError::InvalidResponse(format!(
                    "{method}: response is not an object"
                )));
            }
        };
        Ok(serde_json::from_value(result)?)
    }

    /// Discover available RPC methods; returns the server's OpenRPC document
    pub async fn rpc_discover(&self) -> Result<Value> {
        self.request("rpc.discover", json!([])).await
    }
}
