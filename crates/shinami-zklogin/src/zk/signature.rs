/*
[INPUT]:  Complete zkLogin proof, max epoch, the user's serialized signature
[OUTPUT]: Base64 zkLogin signature accepted by Sui validators
[POS]:    zkLogin crypto - signature assembly
[UPDATE]: When the zkLogin signature layout changes
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use shinami_clients::sui::{IssBase64Details, ProofPoints};

use super::address::ZKLOGIN_FLAG;
use crate::error::{Result, ZkLoginError};
use crate::user::ZkLoginProof;

#[derive(Serialize)]
struct SignatureInputs<'a> {
    proof_points: &'a ProofPoints,
    iss_base64_details: &'a IssBase64Details,
    header_base64: &'a str,
    address_seed: &'a str,
}

#[derive(Serialize)]
struct ZkLoginSignature<'a> {
    inputs: SignatureInputs<'a>,
    max_epoch: u64,
    user_signature: Vec<u8>,
}

/// Combine the proof and the ephemeral key's signature into a zkLogin signature.
///
/// `user_signature` is the base64 serialized Sui signature (`flag || sig || pk`).
pub fn assemble_zklogin_signature(
    proof: &ZkLoginProof,
    max_epoch: u64,
    user_signature: &str,
) -> Result<String> {
    let user_signature = STANDARD
        .decode(user_signature)
        .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad user signature: {err}")))?;

    let signature = ZkLoginSignature {
        inputs: SignatureInputs {
            proof_points: &proof.proof_points,
            iss_base64_details: &proof.iss_base64_details,
            header_base64: &proof.header_base64,
            address_seed: &proof.address_seed,
        },
        max_epoch,
        user_signature,
    };
    let body = bcs::to_bytes(&signature).map_err(|err| ZkLoginError::Crypto(err.to_string()))?;

    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.push(ZKLOGIN_FLAG);
    bytes.extend_from_slice(&body);
    Ok(STANDARD.encode(bytes))
}
