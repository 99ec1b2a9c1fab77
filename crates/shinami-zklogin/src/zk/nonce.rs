/*
[INPUT]:  Ephemeral Ed25519 public key, max epoch, JWT randomness
[OUTPUT]: zkLogin nonce committed into the OpenID token request
[POS]:    zkLogin crypto - binds an ephemeral key to an identity token
[UPDATE]: When the nonce derivation or key encoding changes
*/

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ed25519_dalek::VerifyingKey;
use num_bigint::BigUint;
use rand::RngCore;

use super::poseidon::poseidon_hash;
use crate::error::{Result, ZkLoginError};

/// Sui signature scheme flag for Ed25519 keys
pub const ED25519_FLAG: u8 = 0x00;

/// Length of the base64url nonce (20 bytes, unpadded)
pub const NONCE_LENGTH: usize = 27;

const NONCE_BYTES: usize = 20;

/// Sui-format public key bytes: `flag || key`
pub fn extended_public_key(key: &VerifyingKey) -> [u8; 33] {
    let mut bytes = [0u8; 33];
    bytes[0] = ED25519_FLAG;
    bytes[1..].copy_from_slice(key.as_bytes());
    bytes
}

/// Base64 of [`extended_public_key`], as sent to the login route and prover
pub fn extended_public_key_base64(key: &VerifyingKey) -> String {
    STANDARD.encode(extended_public_key(key))
}

/// Parse a base64 `flag || key` Ed25519 public key
pub fn parse_extended_public_key(value: &str) -> Result<VerifyingKey> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad ephemeral public key: {err}")))?;
    let Some((&flag, key)) = bytes.split_first() else {
        return Err(ZkLoginError::InvalidRequest("Empty ephemeral public key".to_string()));
    };
    if flag != ED25519_FLAG {
        return Err(ZkLoginError::InvalidRequest(format!(
            "Unsupported ephemeral key scheme: {flag}"
        )));
    }
    let key: [u8; 32] = key
        .try_into()
        .map_err(|_| ZkLoginError::InvalidRequest("Bad ephemeral public key length".to_string()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad ephemeral public key: {err}")))
}

/// 128 bits of randomness for a new login attempt
pub fn generate_randomness() -> BigUint {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

/// Derive the nonce from `flag || key`, max epoch and randomness
pub fn generate_nonce(extended_key: &[u8], max_epoch: u64, randomness: &BigUint) -> Result<String> {
    let key = BigUint::from_bytes_be(extended_key);
    let low_mask = (BigUint::from(1u8) << 128u32) - 1u8;
    let key_high = &key >> 128u32;
    let key_low = &key & &low_mask;

    let digest = poseidon_hash(&[key_high, key_low, BigUint::from(max_epoch), randomness.clone()])?;
    Ok(URL_SAFE_NO_PAD.encode(to_padded_be_bytes(&digest, NONCE_BYTES)))
}

/// Big-endian bytes of `value`, left padded or truncated to the low `width` bytes
pub fn to_padded_be_bytes(value: &BigUint, width: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= width {
        return bytes[bytes.len() - width..].to_vec();
    }
    let mut padded = vec![0u8; width - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}
