/*
[INPUT]:  Sui fullnode JSON-RPC endpoint (Shinami node service or any fullnode)
[OUTPUT]: Current epoch timing, transaction execution results
[POS]:    Sui service clients - the few node methods zkLogin flows need
[UPDATE]: When more node methods are needed
*/

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::wallet::ExecuteTransactionRequestType;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient};

/// Network time reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub epoch: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub epoch_start_timestamp_ms: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub epoch_duration_ms: u64,
}

/// Execution status reported in transaction effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Response of `sui_executeTransactionBlock`; unmodelled fields are kept in `rest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBlockResponse {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl TransactionBlockResponse {
    /// True when effects are present and report success
    pub fn is_success(&self) -> bool {
        self.effects
            .as_ref()
            .is_some_and(|effects| effects.status.status == "success")
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.effects
            .as_ref()
            .and_then(|effects| effects.status.error.as_deref())
    }
}

/// Minimal Sui node client
#[derive(Debug, Clone)]
pub struct NodeClient {
    rpc: ShinamiRpcClient,
}

impl NodeClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::Node);
        Self::with_url(access_key, &url)
    }

    pub fn with_url(access_key: &str, url: &str) -> Result<Self> {
        Self::with_config(access_key, url, ClientConfig::default())
    }

    pub fn with_config(access_key: &str, url: &str, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            rpc: ShinamiRpcClient::with_config(access_key, url, config)?,
        })
    }

    pub fn rpc(&self) -> &ShinamiRpcClient {
        &self.rpc
    }

    /// Epoch fields of `suix_getLatestSuiSystemState`
    pub async fn get_latest_epoch(&self) -> Result<EpochInfo> {
        self.rpc
            .request("suix_getLatestSuiSystemState", json!([]))
            .await
    }

    /// Submit a signed transaction; effects are always requested
    pub async fn execute_transaction_block(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        options: Option<&Value>,
        request_type: Option<ExecuteTransactionRequestType>,
    ) -> Result<TransactionBlockResponse> {
        let mut options = match options {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        options.insert("showEffects".to_string(), Value::Bool(true));

        let mut params = vec![json!(tx_bytes), json!(signatures), Value::Object(options)];
        if let Some(request_type) = request_type {
            params.push(json!(request_type));
        }
        self.rpc.request("sui_executeTransactionBlock", params).await
    }
}

fn u64_from_str_or_num<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse().map_err(de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom("expected unsigned integer")),
        other => Err(de::Error::custom(format!("expected u64, got {other}"))),
    }
}
