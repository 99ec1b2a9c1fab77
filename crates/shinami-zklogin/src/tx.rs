/*
[INPUT]:  Request bodies, the logged-in user, gas station and node clients
[OUTPUT]: Prepared tx bytes for the client to sign, executed tx results
[POS]:    Server layer - tx/exec route pair for zkLogin wallets
[UPDATE]: When the transaction wire format or execution checks change
*/

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shinami_clients::sui::{
    GasStationClient, GaslessTransaction, NodeClient, SponsoredTransaction,
    TransactionBlockResponse,
};
use tracing::{error, info};

use crate::error::{Result, ZkLoginError};
use crate::providers::FromFn;
use crate::user::ZkLoginUser;

/// Transaction bytes for the user to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransactionBytes {
    pub tx_bytes: String,
    /// Sponsor's signature, present for sponsored transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_signature: Option<String>,
}

/// Prepared bytes plus the user's ephemeral signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransactionBytes {
    pub tx_bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_signature: Option<String>,
    pub signature: String,
}

/// Builds complete base64 transaction bytes with the user as sender.
///
/// Return [`ZkLoginError::InvalidRequest`] for bad bodies; it maps to 400.
#[async_trait]
pub trait TransactionBytesBuilder: Send + Sync {
    async fn build(&self, body: &Value, user: &ZkLoginUser) -> Result<String>;
}

/// Builds a gasless transaction kind; the sender is always the user's wallet
#[async_trait]
pub trait GaslessTransactionBuilder: Send + Sync {
    async fn build(&self, body: &Value, user: &ZkLoginUser) -> Result<GaslessTransaction>;
}

/// Turns a successful execution into the route's JSON result
#[async_trait]
pub trait TransactionResponseParser: Send + Sync {
    async fn parse(&self, response: &TransactionBlockResponse, user: &ZkLoginUser) -> Result<Value>;
}

#[async_trait]
pub trait TransactionSponsor: Send + Sync {
    async fn sponsor(&self, tx: &GaslessTransaction) -> Result<SponsoredTransaction>;
}

#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn execute(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        options: Option<&Value>,
    ) -> Result<TransactionBlockResponse>;
}

/// Returns `{digest}`
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestParser;

#[async_trait]
impl TransactionResponseParser for DigestParser {
    async fn parse(&self, response: &TransactionBlockResponse, _user: &ZkLoginUser) -> Result<Value> {
        Ok(json!({ "digest": response.digest }))
    }
}

#[async_trait]
impl<F, Fut> TransactionBytesBuilder for FromFn<F>
where
    F: Fn(Value, ZkLoginUser) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn build(&self, body: &Value, user: &ZkLoginUser) -> Result<String> {
        (self.inner())(body.clone(), user.clone()).await
    }
}

#[async_trait]
impl<F, Fut> GaslessTransactionBuilder for FromFn<F>
where
    F: Fn(Value, ZkLoginUser) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GaslessTransaction>> + Send + 'static,
{
    async fn build(&self, body: &Value, user: &ZkLoginUser) -> Result<GaslessTransaction> {
        (self.inner())(body.clone(), user.clone()).await
    }
}

#[async_trait]
impl<F, Fut> TransactionResponseParser for FromFn<F>
where
    F: Fn(TransactionBlockResponse, ZkLoginUser) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn parse(&self, response: &TransactionBlockResponse, user: &ZkLoginUser) -> Result<Value> {
        (self.inner())(response.clone(), user.clone()).await
    }
}

#[async_trait]
impl TransactionSponsor for GasStationClient {
    async fn sponsor(&self, tx: &GaslessTransaction) -> Result<SponsoredTransaction> {
        Ok(self.sponsor_transaction(tx).await?)
    }
}

#[async_trait]
impl TransactionExecutor for NodeClient {
    async fn execute(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        options: Option<&Value>,
    ) -> Result<TransactionBlockResponse> {
        Ok(self
            .execute_transaction_block(tx_bytes, signatures, options, None)
            .await?)
    }
}

#[derive(Clone)]
enum TxSource {
    Unsponsored(Arc<dyn TransactionBytesBuilder>),
    Sponsored {
        sponsor: Arc<dyn TransactionSponsor>,
        builder: Arc<dyn GaslessTransactionBuilder>,
    },
}

/// Backs one `tx` + `exec` route pair
#[derive(Clone)]
pub struct TxExecHandler {
    source: TxSource,
    executor: Arc<dyn TransactionExecutor>,
    parser: Arc<dyn TransactionResponseParser>,
    options: Option<Value>,
}

impl TxExecHandler {
    /// The user pays for gas
    pub fn new(
        builder: Arc<dyn TransactionBytesBuilder>,
        executor: Arc<dyn TransactionExecutor>,
        parser: Arc<dyn TransactionResponseParser>,
    ) -> Self {
        Self {
            source: TxSource::Unsponsored(builder),
            executor,
            parser,
            options: None,
        }
    }

    /// Gas is sponsored through `sponsor`
    pub fn sponsored(
        sponsor: Arc<dyn TransactionSponsor>,
        builder: Arc<dyn GaslessTransactionBuilder>,
        executor: Arc<dyn TransactionExecutor>,
        parser: Arc<dyn TransactionResponseParser>,
    ) -> Self {
        Self {
            source: TxSource::Sponsored { sponsor, builder },
            executor,
            parser,
            options: None,
        }
    }

    /// Response options passed to execution; effects are always shown
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub async fn prepare(&self, body: &Value, user: &ZkLoginUser) -> Result<PreparedTransactionBytes> {
        match &self.source {
            TxSource::Unsponsored(builder) => Ok(PreparedTransactionBytes {
                tx_bytes: builder.build(body, user).await?,
                gas_signature: None,
            }),
            TxSource::Sponsored { sponsor, builder } => {
                let mut tx = builder.build(body, user).await?;
                tx.sender = Some(user.wallet.clone());
                let sponsored = sponsor.sponsor(&tx).await?;
                info!(wallet = %user.wallet, digest = %sponsored.tx_digest, "transaction sponsored");
                Ok(PreparedTransactionBytes {
                    tx_bytes: sponsored.tx_bytes,
                    gas_signature: Some(sponsored.signature),
                })
            }
        }
    }

    pub async fn execute(&self, body: &Value, user: &ZkLoginUser) -> Result<Value> {
        let signed: SignedTransactionBytes = serde_json::from_value(body.clone())
            .map_err(|err| ZkLoginError::InvalidRequest(err.to_string()))?;

        let mut signatures = vec![user.assemble_signature(&signed.signature)?];
        if let Some(gas_signature) = signed.gas_signature {
            signatures.push(gas_signature);
        }

        let response = self
            .executor
            .execute(&signed.tx_bytes, &signatures, self.options.as_ref())
            .await?;
        if !response.is_success() {
            let reason = response.failure_reason().unwrap_or("unknown").to_string();
            error!(wallet = %user.wallet, digest = %response.digest, reason = %reason, "tx execution failed");
            return Err(ZkLoginError::TxFailed(reason));
        }

        info!(wallet = %user.wallet, digest = %response.digest, "transaction executed");
        self.parser.parse(&response, user).await
    }
}
