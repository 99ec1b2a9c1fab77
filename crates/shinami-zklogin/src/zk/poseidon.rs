/*
[INPUT]:  Unsigned integers below the BN254 scalar field modulus
[OUTPUT]: Circom-compatible Poseidon digests as integers
[POS]:    zkLogin crypto - hash primitive under nonce and address seed
[UPDATE]: When hash parameters or arity limits change
*/

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use num_bigint::BigUint;

use crate::error::{Result, ZkLoginError};

/// Widest input the circom parameter set supports
pub const MAX_INPUTS: usize = 12;

fn field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

fn to_field(value: &BigUint, modulus: &BigUint) -> Result<Fr> {
    if value >= modulus {
        return Err(ZkLoginError::Crypto(
            "poseidon input exceeds field modulus".to_string(),
        ));
    }
    Ok(Fr::from_be_bytes_mod_order(&value.to_bytes_be()))
}

/// Poseidon hash over BN254 with circom parameters
pub fn poseidon_hash(inputs: &[BigUint]) -> Result<BigUint> {
    if inputs.is_empty() || inputs.len() > MAX_INPUTS {
        return Err(ZkLoginError::Crypto(format!(
            "unsupported poseidon arity: {}",
            inputs.len()
        )));
    }

    let modulus = field_modulus();
    let elements = inputs
        .iter()
        .map(|value| to_field(value, &modulus))
        .collect::<Result<Vec<_>>>()?;

    let mut hasher = Poseidon::<Fr>::new_circom(elements.len())
        .map_err(|err| ZkLoginError::Crypto(err.to_string()))?;
    let digest = hasher
        .hash(&elements)
        .map_err(|err| ZkLoginError::Crypto(err.to_string()))?;

    Ok(BigUint::from_bytes_be(&digest.into_bigint().to_bytes_be()))
}
