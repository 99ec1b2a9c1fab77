/*
[INPUT]:  Identity key claims (name, value, aud, iss) and the wallet salt
[OUTPUT]: zkLogin address seed and Sui wallet address
[POS]:    zkLogin crypto - deterministic identity to address derivation
[UPDATE]: When claim length limits or address hashing change
*/

use num_bigint::BigUint;

use super::nonce::to_padded_be_bytes;
use super::poseidon::poseidon_hash;
use crate::error::{Result, ZkLoginError};

pub const MAX_KEY_CLAIM_NAME_LENGTH: usize = 32;
pub const MAX_KEY_CLAIM_VALUE_LENGTH: usize = 115;
pub const MAX_AUD_VALUE_LENGTH: usize = 145;

/// Sui signature scheme flag for zkLogin
pub const ZKLOGIN_FLAG: u8 = 0x05;

const PACK_WIDTH_BYTES: usize = 31;

/// Inputs that pin a zkLogin address
#[derive(Debug, Clone, Copy)]
pub struct AddressParams<'a> {
    pub key_claim_name: &'a str,
    pub key_claim_value: &'a str,
    pub iss: &'a str,
    pub aud: &'a str,
    pub salt: &'a BigUint,
}

/// Zero-pad `value` to `max_len` bytes and pack into 31-byte field elements,
/// aligned from the end.
pub(crate) fn pack_ascii_str(value: &str, max_len: usize) -> Result<Vec<BigUint>> {
    if value.len() > max_len {
        return Err(ZkLoginError::Crypto(format!(
            "string longer than {max_len} bytes"
        )));
    }
    let mut bytes = value.as_bytes().to_vec();
    bytes.resize(max_len, 0);

    let mut chunks = Vec::with_capacity(max_len.div_ceil(PACK_WIDTH_BYTES));
    let mut end = bytes.len();
    while end > 0 {
        let start = end.saturating_sub(PACK_WIDTH_BYTES);
        chunks.push(BigUint::from_bytes_be(&bytes[start..end]));
        end = start;
    }
    chunks.reverse();
    Ok(chunks)
}

pub fn hash_ascii_str_to_field(value: &str, max_len: usize) -> Result<BigUint> {
    poseidon_hash(&pack_ascii_str(value, max_len)?)
}

/// Address seed committed in the proof
pub fn gen_address_seed(
    salt: &BigUint,
    key_claim_name: &str,
    key_claim_value: &str,
    aud: &str,
) -> Result<BigUint> {
    poseidon_hash(&[
        hash_ascii_str_to_field(key_claim_name, MAX_KEY_CLAIM_NAME_LENGTH)?,
        hash_ascii_str_to_field(key_claim_value, MAX_KEY_CLAIM_VALUE_LENGTH)?,
        hash_ascii_str_to_field(aud, MAX_AUD_VALUE_LENGTH)?,
        poseidon_hash(std::slice::from_ref(salt))?,
    ])
}

/// `0x`-prefixed address for an address seed and issuer
pub fn compute_address_from_seed(address_seed: &BigUint, iss: &str) -> Result<String> {
    let iss = if iss == "accounts.google.com" {
        "https://accounts.google.com"
    } else {
        iss
    };
    let iss_len = u8::try_from(iss.len())
        .map_err(|_| ZkLoginError::Crypto("issuer too long".to_string()))?;

    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    state.update(&[ZKLOGIN_FLAG, iss_len]);
    state.update(iss.as_bytes());
    state.update(&to_padded_be_bytes(address_seed, 32));
    Ok(format!("0x{}", state.finalize().to_hex()))
}

pub fn compute_zklogin_address(params: &AddressParams<'_>) -> Result<String> {
    let seed = gen_address_seed(
        params.salt,
        params.key_claim_name,
        params.key_claim_value,
        params.aud,
    )?;
    compute_address_from_seed(&seed, params.iss)
}
