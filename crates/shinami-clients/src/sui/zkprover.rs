/*
[INPUT]:  OpenID token, ephemeral public key, max epoch, randomness, salt
[OUTPUT]: Partial zkLogin proof (everything but the address seed)
[POS]:    Sui service clients - zkLogin proving service
[UPDATE]: When the prover RPC schema changes
*/

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::encoding::bigint_to_base64;
use crate::region::{Chain, Service, url_for_access_key};
use crate::rpc::{ClientConfig, Result, ShinamiRpcClient, trim_trailing_params};

/// Groth16 proof points as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub a: Vec<String>,
    pub b: Vec<Vec<String>>,
    pub c: Vec<String>,
}

/// Location of the `iss` claim inside the base64url payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssBase64Details {
    pub value: String,
    pub index_mod4: u8,
}

/// Proof returned by the prover; needs an address seed before it is usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialZkLoginProof {
    pub proof_points: ProofPoints,
    pub iss_base64_details: IssBase64Details,
    pub header_base64: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateZkLoginProofResult {
    zk_proof: PartialZkLoginProof,
}

/// Shinami zkLogin prover RPC client
#[derive(Debug, Clone)]
pub struct ZkProverClient {
    rpc: ShinamiRpcClient,
}

impl ZkProverClient {
    pub fn new(access_key: &str) -> Result<Self> {
        let url = url_for_access_key(access_key, Chain::Sui, Service::ZkProver);
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

    /// Request a zkLogin proof.
    ///
    /// `extended_ephemeral_public_key` is the Sui-format key (`flag || key`),
    /// base64 encoded.
    pub async fn create_zklogin_proof(
        &self,
        jwt: &str,
        max_epoch: u64,
        extended_ephemeral_public_key: &str,
        jwt_randomness: &BigUint,
        salt: &BigUint,
        key_claim_name: Option<&str>,
    ) -> Result<PartialZkLoginProof> {
        let params = trim_trailing_params(vec![
            json!(jwt),
            json!(max_epoch.to_string()),
            json!(extended_ephemeral_public_key),
            json!(bigint_to_base64(jwt_randomness)),
            json!(bigint_to_base64(salt)),
            json!(key_claim_name),
        ]);
        let result: CreateZkLoginProofResult = self
            .rpc
            .request("shinami_zkp_createZkLoginProof", params)
            .await?;
        Ok(result.zk_proof)
    }
}
