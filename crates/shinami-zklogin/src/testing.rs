/*
[INPUT]:  None
[OUTPUT]: Sample users and proofs for unit tests
[POS]:    Test support - compiled only for tests
[UPDATE]: When ZkLoginUser gains fields
*/

use serde_json::json;
use shinami_clients::sui::{IssBase64Details, PartialZkLoginProof, ProofPoints};

use crate::user::{OidProvider, ZkLoginProof, ZkLoginUser, ZkLoginUserId};

pub(crate) fn sample_partial_proof() -> PartialZkLoginProof {
    PartialZkLoginProof {
        proof_points: ProofPoints {
            a: vec!["1".into(), "2".into(), "1".into()],
            b: vec![
                vec!["3".into(), "4".into()],
                vec!["5".into(), "6".into()],
                vec!["1".into(), "0".into()],
            ],
            c: vec!["7".into(), "8".into(), "1".into()],
        },
        iss_base64_details: IssBase64Details {
            value: "yJpc3MiOiJodHRwczovL2FjY291bnRzLmdvb2dsZS5jb20iLC".into(),
            index_mod4: 1,
        },
        header_base64: "eyJhbGciOiJSUzI1NiJ9".into(),
    }
}

pub(crate) fn sample_user(max_epoch: u64) -> ZkLoginUser {
    ZkLoginUser {
        id: ZkLoginUserId {
            iss: "https://accounts.google.com".into(),
            aud: "app-1".into(),
            key_claim_name: "sub".into(),
            key_claim_value: "user-1".into(),
        },
        oid_provider: OidProvider::Google,
        jwt_claims: json!({ "sub": "user-1", "nonce": "nonce-1" }),
        auth_context: json!({}),
        max_epoch,
        wallet: "0x1".into(),
        zk_proof: ZkLoginProof::new(sample_partial_proof(), &12345u32.into()),
    }
}
