/*
[INPUT]:  Serialized Aptos transactions and sender authenticators
[OUTPUT]: Fee payer signatures, submitted transactions, fund info
[POS]:    Aptos service clients - Gas Station
[UPDATE]: When Aptos Gas Station RPC methods change
*/

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::transaction::{AccountSignature, AptosTransaction};
use crate::encoding::to_hex_prefixed;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient, trim_trailing_params};

/// Gas fund associated with an access key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub network: String,
    pub name: String,
    pub balance: u64,
    pub in_flight: u64,
    pub deposit_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SponsorTransactionResult {
    fee_payer: AccountSignature,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingTransactionResult {
    pending_transaction: Value,
}

/// Aptos (and Movement) Gas Station RPC client
#[derive(Debug, Clone)]
pub struct GasStationClient {
    rpc: ShinamiRpcClient,
}

impl GasStationClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Aptos, Service::Gas);
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

    /// Sponsor a transaction. Sets `fee_payer_address` on success and returns
    /// the fee payer's authenticator.
    pub async fn sponsor_transaction(&self, tx: &mut AptosTransaction) -> Result<Vec<u8>> {
        let params = trim_trailing_params(vec![
            json!(tx.raw_transaction_hex()),
            json!(tx.secondary_signer_addresses),
        ]);
        let result: SponsorTransactionResult =
            self.rpc.request("gas_sponsorTransaction", params).await?;
        tx.fee_payer_address = Some(result.fee_payer.address);
        Ok(result.fee_payer.signature)
    }

    /// Sponsor a signed transaction and submit it; returns the pending transaction
    pub async fn sponsor_and_submit_signed_transaction(
        &self,
        tx: &AptosTransaction,
        sender_signature: &[u8],
        secondary_signatures: &[Vec<u8>],
    ) -> Result<Value> {
        let secondary = tx.secondary_signers(secondary_signatures)?;
        let result: PendingTransactionResult = self
            .rpc
            .request(
                "gas_sponsorAndSubmitSignedTransaction",
                json!([
                    tx.raw_transaction_hex(),
                    to_hex_prefixed(sender_signature),
                    secondary,
                ]),
            )
            .await?;
        Ok(result.pending_transaction)
    }

    pub async fn get_fund(&self) -> Result<Fund> {
        self.rpc.request("gas_getFund", json!([])).await
    }
}
