/*
[INPUT]:  BCS bytes of an Aptos raw transaction plus its signer layout
[OUTPUT]: Hex wire forms expected by Shinami Aptos services
[POS]:    Aptos service clients - transaction envelope shared by gas and wallet
[UPDATE]: When multi-agent or fee payer encoding changes
*/

use serde::{Deserialize, Serialize};

use crate::encoding::to_hex_prefixed;
use crate::rpc::{Result, ShinamiError};

/// An Aptos transaction already serialized by the caller's SDK
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AptosTransaction {
    /// BCS bytes of the `RawTransaction`
    pub raw_transaction: Vec<u8>,
    /// Present for multi-agent transactions
    pub secondary_signer_addresses: Option<Vec<String>>,
    /// Filled in after sponsorship
    pub fee_payer_address: Option<String>,
}

/// Address plus BCS `AccountAuthenticator` bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSignature {
    pub address: String,
    pub signature: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SecondarySigner {
    pub address: String,
    pub signature: String,
}

impl AptosTransaction {
    pub(crate) fn raw_transaction_hex(&self) -> String {
        to_hex_prefixed(&self.raw_transaction)
    }

    /// Pair secondary signer addresses with their authenticators
    pub(crate) fn secondary_signers(&self, signatures: &[Vec<u8>]) -> Result<Vec<SecondarySigner>> {
        let Some(addresses) = &self.secondary_signer_addresses else {
            return Ok(Vec::new());
        };
        if addresses.len() != signatures.len() {
            return Err(ShinamiError::InvalidInput(
                "Unexpected number of secondary signatures".to_string(),
            ));
        }
        Ok(addresses
            .iter()
            .zip(signatures)
            .map(|(address, signature)| SecondarySigner {
                address: address.clone(),
                signature: to_hex_prefixed(signature),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secondary_signers_must_match() {
        let tx = AptosTransaction {
            raw_transaction: vec![1, 2],
            secondary_signer_addresses: Some(vec!["0x1".to_string(), "0x2".to_string()]),
            fee_payer_address: None,
        };
        assert!(tx.secondary_signers(&[vec![0xaa]]).is_err());

        let signers = tx.secondary_signers(&[vec![0xaa], vec![0xbb]]).unwrap();
        assert_eq!(signers[1].address, "0x2");
        assert_eq!(signers[1].signature, "0xbb");
        assert_eq!(tx.raw_transaction_hex(), "0x0102");
    }

    #[test]
    fn test_simple_transaction_has_no_secondary_signers() {
        let tx = AptosTransaction::default();
        assert!(tx.secondary_signers(&[]).unwrap().is_empty());
    }
}
