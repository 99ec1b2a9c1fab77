/*
[INPUT]:  OpenID tokens issued for a zkLogin session
[OUTPUT]: zkLogin wallet (user id, salt, address) managed by Shinami
[POS]:    Sui service clients - zkLogin wallet / salt service
[UPDATE]: When the zkwallet RPC schema changes
*/

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::encoding::base64_to_bigint;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient};

/// Durable identity of a zkLogin user under one OAuth application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginUserId {
    pub iss: String,
    pub aud: String,
    pub key_claim_name: String,
    pub key_claim_value: String,
}

/// A zkLogin wallet and the salt used to derive its address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkLoginWallet {
    pub user_id: ZkLoginUserId,
    pub sub_wallet: u32,
    pub salt: BigUint,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetOrCreateParams<'a> {
    jwt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_claim_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_wallet: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZkLoginWalletResponse {
    user_id: ZkLoginUserId,
    sub_wallet: u32,
    salt: String,
    address: String,
}

/// Shinami zkLogin wallet RPC client
#[derive(Debug, Clone)]
pub struct ZkWalletClient {
    rpc: ShinamiRpcClient,
}

impl ZkWalletClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::ZkWallet);
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

    /// Get, or create on first use, the zkLogin wallet for the token's identity
    pub async fn get_or_create_zklogin_wallet(
        &self,
        jwt: &str,
        key_claim_name: Option<&str>,
        sub_wallet: Option<u32>,
    ) -> Result<ZkLoginWallet> {
        let params = GetOrCreateParams {
            jwt,
            key_claim_name,
            sub_wallet,
        };
        let resp: ZkLoginWalletResponse = self
            .rpc
            .request("shinami_zkw_getOrCreateZkLoginWallet", params)
            .await?;

        Ok(ZkLoginWallet {
            user_id: resp.user_id,
            sub_wallet: resp.sub_wallet,
            salt: base64_to_bigint(&resp.salt)?,
            address: resp.address,
        })
    }
}
