/*
[INPUT]:  Wallet ids, wallet secrets, transaction bytes
[OUTPUT]: Session tokens, invisible wallets, signatures, executed transactions
[POS]:    Sui service clients - Key Service, Wallet Service and wallet signer
[UPDATE]: When wallet RPC methods change or signer behavior changes
*/

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::gas::GaslessTransaction;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient, trim_trailing_params};
use crate::session::{KeySession, SessionIssuer};

/// Sui Key Service RPC client
#[derive(Debug, Clone)]
pub struct KeyClient {
    rpc: ShinamiRpcClient,
}

impl KeyClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::Key);
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

    /// Create a session token from a wallet secret
    pub async fn create_session(&self, secret: &str) -> Result<String> {
        self.rpc.request("shinami_key_createSession", [secret]).await
    }
}

#[async_trait]
impl SessionIssuer for KeyClient {
    async fn create_session(&self, secret: &str) -> Result<String> {
        KeyClient::create_session(self, secret).await
    }
}

/// Signature produced by the wallet service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResult {
    pub signature: String,
    pub tx_digest: String,
}

/// How long the node waits before answering an execution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecuteTransactionRequestType {
    WaitForEffectsCert,
    WaitForLocalExecution,
}

/// Sui Wallet Service RPC client
#[derive(Debug, Clone)]
pub struct WalletClient {
    rpc: ShinamiRpcClient,
}

impl WalletClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::Wallet);
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

    /// Create a wallet; the id must not have been used before
    pub async fn create_wallet(&self, wallet_id: &str, session_token: &str) -> Result<String> {
        self.rpc
            .request("shinami_wal_createWallet", [wallet_id, session_token])
            .await
    }

    pub async fn get_wallet(&self, wallet_id: &str) -> Result<String> {
        self.rpc.request("shinami_wal_getWallet", [wallet_id]).await
    }

    /// Sign base64 encoded transaction bytes
    pub async fn sign_transaction(
        &self,
        wallet_id: &str,
        session_token: &str,
        tx_bytes: &str,
    ) -> Result<SignTransactionResult> {
        self.rpc
            .request(
                "shinami_wal_signTransactionBlock",
                [wallet_id, session_token, tx_bytes],
            )
            .await
    }

    /// Sign a personal message, returning the serialized signature
    pub async fn sign_personal_message(
        &self,
        wallet_id: &str,
        session_token: &str,
        message: &[u8],
        wrap_bcs: bool,
    ) -> Result<String> {
        self.rpc
            .request(
                "shinami_wal_signPersonalMessage",
                json!([wallet_id, session_token, STANDARD.encode(message), wrap_bcs]),
            )
            .await
    }

    /// Sponsor, sign and execute a transaction kind with the wallet as sender
    pub async fn execute_gasless_transaction(
        &self,
        wallet_id: &str,
        session_token: &str,
        tx: &GaslessTransaction,
        options: Option<&Value>,
        request_type: Option<ExecuteTransactionRequestType>,
    ) -> Result<Value> {
        let params = trim_trailing_params(vec![
            json!(wallet_id),
            json!(session_token),
            json!(tx.tx_kind),
            json!(tx.gas_budget),
            json!(options),
            json!(request_type),
            json!(tx.gas_price),
        ]);
        self.rpc
            .request("shinami_wal_executeGaslessTransactionBlock", params)
            .await
    }

    pub async fn set_beneficiary(
        &self,
        wallet_id: &str,
        session_token: &str,
        beneficiary_graph_id: &str,
        beneficiary_address: &str,
    ) -> Result<String> {
        self.rpc
            .request(
                "shinami_walx_setBeneficiary",
                [wallet_id, session_token, beneficiary_graph_id, beneficiary_address],
            )
            .await
    }

    pub async fn unset_beneficiary(
        &self,
        wallet_id: &str,
        session_token: &str,
        beneficiary_graph_id: &str,
    ) -> Result<String> {
        self.rpc
            .request(
                "shinami_walx_unsetBeneficiary",
                [wallet_id, session_token, beneficiary_graph_id],
            )
            .await
    }

    pub async fn get_beneficiary(
        &self,
        wallet_id: &str,
        beneficiary_graph_id: &str,
    ) -> Result<Option<String>> {
        self.rpc
            .request("shinami_walx_getBeneficiary", [wallet_id, beneficiary_graph_id])
            .await
    }
}

/// Signer backed by a Shinami invisible wallet; session tokens are refreshed
/// transparently.
#[derive(Debug)]
pub struct ShinamiWalletSigner<I = KeyClient> {
    wallet_id: String,
    wallet_client: WalletClient,
    session: KeySession<I>,
    address: OnceCell<String>,
}

impl ShinamiWalletSigner<KeyClient> {
    /// Build a signer with its own key session
    pub fn with_secret(
        wallet_id: impl Into<String>,
        wallet_client: WalletClient,
        secret: impl Into<String>,
        key_client: KeyClient,
    ) -> Self {
        Self::new(wallet_id, wallet_client, KeySession::new(secret, key_client))
    }
}

impl<I: SessionIssuer> ShinamiWalletSigner<I> {
    pub fn new(wallet_id: impl Into<String>, wallet_client: WalletClient, session: KeySession<I>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            wallet_client,
            session,
            address: OnceCell::new(),
        }
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn session(&self) -> &KeySession<I> {
        &self.session
    }

    /// Wallet address, cached after the first successful lookup.
    ///
    /// With `auto_create`, a missing wallet is created first.
    pub async fn get_address(&self, auto_create: bool) -> Result<String> {
        self.address
            .get_or_try_init(|| self.lookup_address(auto_create))
            .await
            .cloned()
    }

    async fn lookup_address(&self, auto_create: bool) -> Result<String> {
        match self.wallet_client.get_wallet(&self.wallet_id).await {
            Err(err) if auto_create && err.is_invalid_params() => {
                debug!(wallet_id = %self.wallet_id, "wallet not found, creating");
                match self.try_create().await? {
                    Some(address) => Ok(address),
                    None => self.wallet_client.get_wallet(&self.wallet_id).await,
                }
            }
            other => other,
        }
    }

    /// Create the wallet, or return `None` if the id is already taken
    pub async fn try_create(&self) -> Result<Option<String>> {
        let created = self
            .session
            .with_token(|token| async move {
                self.wallet_client.create_wallet(&self.wallet_id, &token).await
            })
            .await;

        match created {
            Ok(address) => {
                info!(wallet_id = %self.wallet_id, address = %address, "wallet created");
                Ok(Some(address))
            }
            Err(err) if err.is_wallet_id_taken() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn sign_transaction(&self, tx_bytes: &str) -> Result<SignTransactionResult> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .sign_transaction(&self.wallet_id, &token, tx_bytes)
                    .await
            })
            .await
    }

    pub async fn sign_personal_message(&self, message: &[u8], wrap_bcs: bool) -> Result<String> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .sign_personal_message(&self.wallet_id, &token, message, wrap_bcs)
                    .await
            })
            .await
    }

    pub async fn execute_gasless_transaction(
        &self,
        tx: &GaslessTransaction,
        options: Option<&Value>,
        request_type: Option<ExecuteTransactionRequestType>,
    ) -> Result<Value> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .execute_gasless_transaction(&self.wallet_id, &token, tx, options, request_type)
                    .await
            })
            .await
    }

    pub async fn set_beneficiary(
        &self,
        beneficiary_graph_id: &str,
        beneficiary_address: &str,
    ) -> Result<String> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .set_beneficiary(&self.wallet_id, &token, beneficiary_graph_id, beneficiary_address)
                    .await
            })
            .await
    }

    pub async fn unset_beneficiary(&self, beneficiary_graph_id: &str) -> Result<String> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .unset_beneficiary(&self.wallet_id, &token, beneficiary_graph_id)
                    .await
            })
            .await
    }

    pub async fn get_beneficiary(&self, beneficiary_graph_id: &str) -> Result<Option<String>> {
        self.wallet_client
            .get_beneficiary(&self.wallet_id, beneficiary_graph_id)
            .await
    }
}
