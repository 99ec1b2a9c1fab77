/*
[INPUT]:  Wallet ids, wallet secrets, serialized Aptos transactions
[OUTPUT]: Session tokens, invisible wallets, authenticators, pending transactions
[POS]:    Aptos service clients - Key Service, Wallet Service and wallet signer
[UPDATE]: When Aptos wallet RPC methods change or signer behavior changes
*/

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::transaction::AptosTransaction;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient, trim_trailing_params};
use crate::session::{KeySession, SessionIssuer};

/// Aptos Key Service RPC client
#[derive(Debug, Clone)]
pub struct KeyClient {
    rpc: ShinamiRpcClient,
}

impl KeyClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Aptos, Service::Key);
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

    pub async fn create_session(&self, secret: &str) -> Result<String> {
        self.rpc.request("key_createSession", [secret]).await
    }
}

#[async_trait]
impl SessionIssuer for KeyClient {
    async fn create_session(&self, secret: &str) -> Result<String> {
        KeyClient::create_session(self, secret).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletResult {
    account_address: String,
}

#[derive(Debug, Deserialize)]
struct SignTransactionResult {
    signature: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteGaslessTransactionResult {
    pending_transaction: Value,
}

/// Aptos Wallet Service RPC client
#[derive(Debug, Clone)]
pub struct WalletClient {
    rpc: ShinamiRpcClient,
}

impl WalletClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Aptos, Service::Wallet);
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

    async fn wallet_call(&self, method: &str, wallet_id: &str, session_token: &str) -> Result<String> {
        let result: WalletResult = self.rpc.request(method, [wallet_id, session_token]).await?;
        Ok(result.account_address)
    }

    /// Create a wallet without initializing it on chain
    pub async fn create_wallet(&self, wallet_id: &str, session_token: &str) -> Result<String> {
        self.wallet_call("wal_createWallet", wallet_id, session_token).await
    }

    /// Initialize a wallet previously created with `create_wallet`
    pub async fn initialize_wallet_on_chain(
        &self,
        wallet_id: &str,
        session_token: &str,
    ) -> Result<String> {
        self.wallet_call("wal_initializeWalletOnChain", wallet_id, session_token)
            .await
    }

    /// Create a wallet and initialize it on chain in one call
    pub async fn create_wallet_on_chain(&self, wallet_id: &str, session_token: &str) -> Result<String> {
        self.wallet_call("wal_createWalletOnChain", wallet_id, session_token)
            .await
    }

    pub async fn get_wallet(&self, wallet_id: &str) -> Result<String> {
        let result: WalletResult = self.rpc.request("wal_getWallet", [wallet_id]).await?;
        Ok(result.account_address)
    }

    /// Sign a transaction; returns BCS `AccountAuthenticator` bytes
    pub async fn sign_transaction(
        &self,
        wallet_id: &str,
        session_token: &str,
        tx: &AptosTransaction,
    ) -> Result<Vec<u8>> {
        let params = trim_trailing_params(vec![
            json!(wallet_id),
            json!(session_token),
            json!(tx.raw_transaction_hex()),
            json!(tx.secondary_signer_addresses),
            json!(tx.fee_payer_address),
        ]);
        let result: SignTransactionResult =
            self.rpc.request("wal_signTransaction", params).await?;
        Ok(result.signature)
    }

    /// Sponsor, sign and submit with the wallet as sender
    pub async fn execute_gasless_transaction(
        &self,
        wallet_id: &str,
        session_token: &str,
        tx: &AptosTransaction,
        secondary_signatures: &[Vec<u8>],
    ) -> Result<Value> {
        let secondary = tx.secondary_signers(secondary_signatures)?;
        let result: ExecuteGaslessTransactionResult = self
            .rpc
            .request(
                "wal_executeGaslessTransaction",
                json!([wallet_id, session_token, tx.raw_transaction_hex(), secondary]),
            )
            .await?;
        Ok(result.pending_transaction)
    }
}

/// Signer backed by a Shinami invisible wallet on Aptos
#[derive(Debug)]
pub struct ShinamiWalletSigner<I = KeyClient> {
    wallet_id: String,
    wallet_client: WalletClient,
    session: KeySession<I>,
    address: OnceCell<String>,
}

impl ShinamiWalletSigner<KeyClient> {
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

    /// Wallet address, cached after the first successful lookup.
    ///
    /// With `auto_create`, a missing wallet is created (on chain if `on_chain`).
    pub async fn get_address(&self, auto_create: bool, on_chain: bool) -> Result<String> {
        self.address
            .get_or_try_init(|| self.lookup_address(auto_create, on_chain))
            .await
            .cloned()
    }

    async fn lookup_address(&self, auto_create: bool, on_chain: bool) -> Result<String> {
        match self.wallet_client.get_wallet(&self.wallet_id).await {
            Err(err) if auto_create && err.is_invalid_params() => {
                debug!(wallet_id = %self.wallet_id, "wallet not found, creating");
                match self.try_create(on_chain).await? {
                    Some(address) => Ok(address),
                    None => self.wallet_client.get_wallet(&self.wallet_id).await,
                }
            }
            other => other,
        }
    }

    /// Create the wallet, or return `None` if the id is already taken
    pub async fn try_create(&self, on_chain: bool) -> Result<Option<String>> {
        let created = self
            .session
            .with_token(|token| async move {
                if on_chain {
                    self.wallet_client
                        .create_wallet_on_chain(&self.wallet_id, &token)
                        .await
                } else {
                    self.wallet_client.create_wallet(&self.wallet_id, &token).await
                }
            })
            .await;

        match created {
            Ok(address) => {
                info!(wallet_id = %self.wallet_id, address = %address, on_chain, "wallet created");
                Ok(Some(address))
            }
            Err(err) if err.is_wallet_id_taken() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn initialize_wallet_on_chain(&self) -> Result<String> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .initialize_wallet_on_chain(&self.wallet_id, &token)
                    .await
            })
            .await
    }

    pub async fn sign_transaction(&self, tx: &AptosTransaction) -> Result<Vec<u8>> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .sign_transaction(&self.wallet_id, &token, tx)
                    .await
            })
            .await
    }

    pub async fn execute_gasless_transaction(
        &self,
        tx: &AptosTransaction,
        secondary_signatures: &[Vec<u8>],
    ) -> Result<Value> {
        self.session
            .with_token(|token| async move {
                self.wallet_client
                    .execute_gasless_transaction(&self.wallet_id, &token, tx, secondary_signatures)
                    .await
            })
            .await
    }
}
