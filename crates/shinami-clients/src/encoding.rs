/*
[INPUT]:  Big integers and their base64 / hex wire encodings
[OUTPUT]: Conversions used by zkLogin salt, randomness and Aptos payloads
[POS]:    Utility layer - wire encodings shared across services
[UPDATE]: When a service changes how it encodes large numbers or bytes
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use num_bigint::BigUint;

use crate::rpc::{Result, ShinamiError};

/// Encode as base64 of the minimal big-endian bytes
pub fn bigint_to_base64(value: &BigUint) -> String {
    STANDARD.encode(value.to_bytes_be())
}

/// Decode base64 big-endian bytes into an integer
pub fn base64_to_bigint(value: &str) -> Result<BigUint> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|err| ShinamiError::InvalidResponse(format!("bad base64 integer: {err}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Hex-encode with a `0x` prefix
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigint_base64_known_values() {
        assert_eq!(bigint_to_base64(&BigUint::from(0u8)), "AA==");
        assert_eq!(bigint_to_base64(&BigUint::from(0x0102u16)), "AQI=");
        assert_eq!(base64_to_bigint("AQI=").unwrap(), BigUint::from(258u32));
    }

    #[test]
    fn test_large_salt_survives() {
        let salt: BigUint = "129390038577185583942388216820280642146".parse().unwrap();
        assert_eq!(base64_to_bigint(&bigint_to_base64(&salt)).unwrap(), salt);
    }

    #[test]
    fn test_bad_base64_rejected() {
        assert!(base64_to_bigint("***").is_err());
    }

    #[test]
    fn test_to_hex_prefixed() {
        assert_eq!(to_hex_prefixed(&[0xab, 0x01]), "0xab01");
    }
}
