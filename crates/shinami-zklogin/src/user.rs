/*
[INPUT]:  Login request bodies, verified JWT claims, proofs from the prover
[OUTPUT]: OpenID provider enum, login request, zkLogin user and proof types
[POS]:    Data model - wire schemas shared by server routes and clients
[UPDATE]: When adding providers or changing the login wire format
*/

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shinami_clients::sui::{IssBase64Details, PartialZkLoginProof, ProofPoints};

pub use shinami_clients::sui::ZkLoginUserId;

use crate::error::{Result, ZkLoginError};
use crate::zk::{assemble_zklogin_signature, parse_extended_public_key};

/// Claim identifying the user when the request does not name one
pub const DEFAULT_KEY_CLAIM_NAME: &str = "sub";
/// jwtRandomness is a 128-bit value
pub const JWT_RANDOMNESS_BITS: u64 = 128;

/// Supported OpenID providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OidProvider {
    Google,
    Facebook,
    Twitch,
    Apple,
}

impl OidProvider {
    pub const ALL: [OidProvider; 4] = [
        OidProvider::Google,
        OidProvider::Facebook,
        OidProvider::Twitch,
        OidProvider::Apple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OidProvider::Google => "google",
            OidProvider::Facebook => "facebook",
            OidProvider::Twitch => "twitch",
            OidProvider::Apple => "apple",
        }
    }

    /// Published key set for token signature verification
    pub fn jwks_url(&self) -> &'static str {
        match self {
            OidProvider::Google => "https://www.googleapis.com/oauth2/v3/certs",
            OidProvider::Facebook => "https://www.facebook.com/.well-known/oauth/openid/jwks/",
            OidProvider::Twitch => "https://id.twitch.tv/oauth2/keys",
            OidProvider::Apple => "https://appleid.apple.com/auth/keys",
        }
    }
}

impl fmt::Display for OidProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OidProvider {
    type Err = ZkLoginError;

    fn from_str(s: &str) -> Result<Self> {
        OidProvider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == s)
            .ok_or_else(|| ZkLoginError::InvalidRequest(format!("Unknown OpenID provider: {s}")))
    }
}

/// Body of the login route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginRequest {
    pub oid_provider: OidProvider,
    pub jwt: String,
    /// Base64 of `flag || ed25519 public key`
    pub extended_ephemeral_public_key: String,
    pub max_epoch: u64,
    /// Decimal string
    pub jwt_randomness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_claim_name: Option<String>,
}

/// Request fields that needed parsing beyond serde
#[derive(Debug, Clone)]
pub struct ParsedLoginRequest {
    pub ephemeral_public_key: VerifyingKey,
    pub jwt_randomness: BigUint,
    pub key_claim_name: String,
}

impl ZkLoginRequest {
    pub fn parse(&self) -> Result<ParsedLoginRequest> {
        if self.jwt.is_empty() {
            return Err(ZkLoginError::InvalidRequest("Missing jwt".to_string()));
        }
        let ephemeral_public_key = parse_extended_public_key(&self.extended_ephemeral_public_key)?;
        let jwt_randomness = self
            .jwt_randomness
            .parse::<BigUint>()
            .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad jwtRandomness: {err}")))?;
        if jwt_randomness.bits() > JWT_RANDOMNESS_BITS {
            return Err(ZkLoginError::InvalidRequest(format!(
                "Bad jwtRandomness: exceeds {JWT_RANDOMNESS_BITS} bits"
            )));
        }
        let key_claim_name = self
            .key_claim_name
            .clone()
            .unwrap_or_else(|| DEFAULT_KEY_CLAIM_NAME.to_string());

        Ok(ParsedLoginRequest {
            ephemeral_public_key,
            jwt_randomness,
            key_claim_name,
        })
    }
}

/// Proof with the address seed filled in; ready for signature assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginProof {
    pub proof_points: ProofPoints,
    pub iss_base64_details: IssBase64Details,
    pub header_base64: String,
    /// Decimal string
    pub address_seed: String,
}

impl ZkLoginProof {
    pub fn new(partial: PartialZkLoginProof, address_seed: &BigUint) -> Self {
        Self {
            proof_points: partial.proof_points,
            iss_base64_details: partial.iss_base64_details,
            header_base64: partial.header_base64,
            address_seed: address_seed.to_string(),
        }
    }
}

/// Authenticated zkLogin user, as stored in the server session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginUser {
    pub id: ZkLoginUserId,
    pub oid_provider: OidProvider,
    pub jwt_claims: Value,
    pub auth_context: Value,
    pub max_epoch: u64,
    pub wallet: String,
    pub zk_proof: ZkLoginProof,
}

impl ZkLoginUser {
    /// Nonce the identity token was issued for
    pub fn jwt_nonce(&self) -> Option<&str> {
        self.jwt_claims.get("nonce").and_then(Value::as_str)
    }

    /// zkLogin signature from the user's ephemeral key signature
    pub fn assemble_signature(&self, user_signature: &str) -> Result<String> {
        assemble_zklogin_signature(&self.zk_proof, self.max_epoch, user_signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zk::extended_public_key_base64;
    use ed25519_dalek::SigningKey;
    use serde_json::json;

    fn request() -> ZkLoginRequest {
        let key = SigningKey::from_bytes(&[1; 32]).verifying_key();
        ZkLoginRequest {
            oid_provider: OidProvider::Google,
            jwt: "a.b.c".to_string(),
            extended_ephemeral_public_key: extended_public_key_base64(&key),
            max_epoch: 10,
            jwt_randomness: "12345".to_string(),
            key_claim_name: None,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["oidProvider"], "google");
        assert_eq!(value["maxEpoch"], 10);
        assert!(value.get("keyClaimName").is_none());

        let parsed: ZkLoginRequest = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, request());
    }

    #[test]
    fn test_request_parse_defaults_key_claim() {
        let parsed = request().parse().unwrap();
        assert_eq!(parsed.key_claim_name, "sub");
        assert_eq!(parsed.jwt_randomness, BigUint::from(12345u32));
    }

    #[test]
    fn test_request_parse_rejects_bad_randomness() {
        let mut req = request();
        req.jwt_randomness = "0x12".to_string();
        assert!(matches!(req.parse(), Err(ZkLoginError::InvalidRequest(_))));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let body = json!({
            "oidProvider": "myspace",
            "jwt": "a.b.c",
            "extendedEphemeralPublicKey": "AA==",
            "maxEpoch": 1,
            "jwtRandomness": "1",
        });
        assert!(serde_json::from_value::<ZkLoginRequest>(body).is_err());
        assert!("myspace".parse::<OidProvider>().is_err());
        assert_eq!("apple".parse::<OidProvider>().unwrap(), OidProvider::Apple);
    }
}
