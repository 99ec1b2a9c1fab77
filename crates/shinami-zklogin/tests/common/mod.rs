/*
[INPUT]:  Test RSA key, fixed epochs, counting salt and proof providers
[OUTPUT]: Signed test tokens, login handlers and local sessions for tests
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When login collaborators or fixtures change
*/

//! Common test utilities for shinami-zklogin tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jwt_simple::prelude::*;
use num_bigint::BigUint;
use parking_lot::Mutex;
use serde_json::Value;
use shinami_clients::sui::{EpochInfo, IssBase64Details, PartialZkLoginProof, ProofPoints};
use shinami_zklogin::login::AllowedApps;
use shinami_zklogin::oidc::{Jwk, JwkSet, StaticKeySet};
use shinami_zklogin::providers::{SaltRequest, ZkProofRequest};
use shinami_zklogin::{
    LocalSession, LoginHandler, OidProvider, UserAuthorizer, ZkLoginError, ZkLoginRequest,
    from_fn,
};

pub const GOOGLE_ISS: &str = "https://accounts.google.com";
pub const APP_ID: &str = "app-1";
pub const SUBJECT: &str = "user-1";
pub const KEY_ID: &str = "test-kid";
// Far enough ahead that saved sessions are never already expired
pub const EPOCH_START_MS: u64 = 4_000_000_000_000;
pub const EPOCH_DURATION_MS: u64 = 86_400_000;

pub fn key_pair() -> &'static RS256KeyPair {
    static KEY: OnceLock<RS256KeyPair> = OnceLock::new();
    KEY.get_or_init(|| {
        RS256KeyPair::generate(2048)
            .expect("generate rsa key")
            .with_key_id(KEY_ID)
    })
}

pub fn jwk_set() -> JwkSet {
    let components = key_pair().public_key().to_components();
    JwkSet {
        keys: vec![Jwk {
            kty: "RSA".into(),
            kid: Some(KEY_ID.into()),
            alg: Some("RS256".into()),
            key_use: Some("sig".into()),
            n: Some(URL_SAFE_NO_PAD.encode(components.n)),
            e: Some(URL_SAFE_NO_PAD.encode(components.e)),
        }],
    }
}

/// Google-style token signed by the test key
pub fn google_jwt(nonce: &str, aud: &str, sub: &str) -> String {
    let claims = Claims::create(Duration::from_hours(1))
        .with_issuer(GOOGLE_ISS)
        .with_audience(aud)
        .with_subject(sub)
        .with_nonce(nonce);
    key_pair().sign(claims).expect("sign token")
}

pub fn login_request(session: &LocalSession, jwt: String) -> ZkLoginRequest {
    ZkLoginRequest {
        oid_provider: OidProvider::Google,
        jwt,
        extended_ephemeral_public_key: session.extended_public_key_base64(),
        max_epoch: session.max_epoch,
        jwt_randomness: session.jwt_randomness.to_string(),
        key_claim_name: None,
    }
}

pub fn partial_proof() -> PartialZkLoginProof {
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

/// Collaborators with observable calls
pub struct TestProviders {
    pub epoch: Arc<AtomicU64>,
    pub salt: BigUint,
    pub salt_calls: Arc<AtomicUsize>,
    pub proof_requests: Arc<Mutex<Vec<ZkProofRequest>>>,
}

impl TestProviders {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch: Arc::new(AtomicU64::new(epoch)),
            salt: BigUint::from(129_390_038_577_185_583_942_388_216_820_280_642_146u128),
            salt_calls: Arc::new(AtomicUsize::new(0)),
            proof_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    pub fn salt_calls(&self) -> usize {
        self.salt_calls.load(Ordering::SeqCst)
    }

    pub fn proof_calls(&self) -> usize {
        self.proof_requests.lock().len()
    }

    pub fn epoch_provider(&self) -> Arc<dyn shinami_zklogin::EpochProvider> {
        let epoch = self.epoch.clone();
        Arc::new(from_fn(move || {
            let epoch = epoch.load(Ordering::SeqCst);
            async move {
                Ok::<_, ZkLoginError>(EpochInfo {
                    epoch,
                    epoch_start_timestamp_ms: EPOCH_START_MS,
                    epoch_duration_ms: EPOCH_DURATION_MS,
                })
            }
        }))
    }

    pub fn handler(&self, allowed_apps: AllowedApps) -> LoginHandler {
        let salt = self.salt.clone();
        let salt_calls = self.salt_calls.clone();
        let salts = from_fn(move |_request: SaltRequest| {
            salt_calls.fetch_add(1, Ordering::SeqCst);
            let salt = salt.clone();
            async move { Ok::<_, ZkLoginError>(salt) }
        });

        let proof_requests = self.proof_requests.clone();
        let prover = from_fn(move |request: ZkProofRequest| {
            proof_requests.lock().push(request);
            async move { Ok::<_, ZkLoginError>(partial_proof()) }
        });

        LoginHandler::new(
            self.epoch_provider(),
            Arc::new(salts),
            Arc::new(prover),
            Arc::new(StaticKeySet::new().with_keys(OidProvider::Google, jwk_set())),
            allowed_apps,
        )
    }
}

pub fn google_apps() -> AllowedApps {
    AllowedApps::from([(OidProvider::Google, vec![APP_ID.to_string()])])
}

/// Rejects everyone
pub fn deny_all() -> Arc<dyn UserAuthorizer> {
    Arc::new(from_fn(
        |_provider: OidProvider, _id: shinami_zklogin::ZkLoginUserId, _claims: Value| async {
            Ok::<Option<Value>, ZkLoginError>(None)
        },
    ))
}
