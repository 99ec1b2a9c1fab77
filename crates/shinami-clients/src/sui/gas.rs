/*
[INPUT]:  Gasless transaction kinds and sponsorship parameters
[OUTPUT]: Sponsored transactions, sponsorship status, fund info
[POS]:    Sui service clients - Gas Station
[UPDATE]: When Gas Station RPC methods or result schemas change
*/

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiError, ShinamiRpcClient, trim_trailing_params};

/// A transaction kind waiting for gas data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessTransaction {
    /// Base64 encoded `TransactionKind` bytes
    pub tx_kind: String,
    /// Required when requesting sponsorship
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Omit to let Gas Station estimate the budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_budget: Option<u64>,
    /// Omit to use the current reference gas price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
}

/// Cost breakdown for the sponsor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorCost {
    pub computation_cost: String,
    pub storage_cost: String,
    pub storage_rebate: String,
}

/// A sponsored transaction ready for the sender's signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredTransaction {
    /// Base64 encoded transaction bytes, including sponsor gas data
    pub tx_bytes: String,
    pub tx_digest: String,
    /// Gas owner's signature
    pub signature: String,
    #[serde(default)]
    pub sponsor_cost: Option<SponsorCost>,
    /// Unix epoch seconds
    #[serde(default)]
    pub expire_at_time: Option<u64>,
    #[serde(default)]
    pub expire_after_epoch: Option<String>,
}

/// Status of a sponsored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SponsoredTransactionStatus {
    InFlight,
    Complete,
    Invalid,
}

/// Gas fund associated with an access key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub network: String,
    pub name: String,
    pub balance: u64,
    pub in_flight: u64,
    #[serde(default)]
    pub deposit_address: Option<String>,
}

/// Sui Gas Station RPC client
#[derive(Debug, Clone)]
pub struct GasStationClient {
    rpc: ShinamiRpcClient,
}

impl GasStationClient {
    /// Client for the regional endpoint encoded in `access_key`
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::Gas);
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

    /// Request gas sponsorship for a transaction kind; `sender` is required
    pub async fn sponsor_transaction(&self, tx: &GaslessTransaction) -> Result<SponsoredTransaction> {
        let sender = tx
            .sender
            .as_deref()
            .ok_or_else(|| ShinamiError::InvalidInput("Missing sender".to_string()))?;
        let params = trim_trailing_params(vec![
            json!(tx.tx_kind),
            json!(sender),
            json!(tx.gas_budget),
            json!(tx.gas_price),
        ]);
        self.rpc.request("gas_sponsorTransactionBlock", params).await
    }

    pub async fn get_sponsored_transaction_status(
        &self,
        tx_digest: &str,
    ) -> Result<SponsoredTransactionStatus> {
        self.rpc
            .request("gas_getSponsoredTransactionBlockStatus", [tx_digest])
            .await
    }

    pub async fn get_fund(&self) -> Result<Fund> {
        self.rpc.request("gas_getFund", json!([])).await
    }
}
