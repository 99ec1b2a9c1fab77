/*
[INPUT]:  Max epoch source, auth backend for logout, client-local storage path
[OUTPUT]: Ephemeral zkLogin sessions persisted as one versioned record
[POS]:    Client layer - local session lifecycle before and after login
[UPDATE]: When the stored record format or session creation flow changes
*/

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signer, SigningKey};
use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::AuthBackend;
use crate::error::{Result, ZkLoginError};
use crate::providers::MaxEpochSource;
use crate::zk::nonce::ED25519_FLAG;
use crate::zk::{extended_public_key, extended_public_key_base64, generate_nonce, generate_randomness};

/// Version of the stored record; other versions are treated as corrupt
pub const LOCAL_SESSION_VERSION: u32 = 1;

/// Intent scope, version and app id for transaction data
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Client-held secrets for one login attempt
#[derive(Debug, Clone)]
pub struct LocalSession {
    pub ephemeral_key: SigningKey,
    pub max_epoch: u64,
    pub jwt_randomness: BigUint,
    pub nonce: String,
}

impl LocalSession {
    /// New keypair and randomness, with the nonce derived from them
    pub fn generate(max_epoch: u64) -> Result<Self> {
        let ephemeral_key = SigningKey::generate(&mut OsRng);
        let jwt_randomness = generate_randomness();
        Self::from_parts(ephemeral_key, max_epoch, jwt_randomness)
    }

    pub fn from_parts(
        ephemeral_key: SigningKey,
        max_epoch: u64,
        jwt_randomness: BigUint,
    ) -> Result<Self> {
        let nonce = generate_nonce(
            &extended_public_key(&ephemeral_key.verifying_key()),
            max_epoch,
            &jwt_randomness,
        )?;
        Ok(Self {
            ephemeral_key,
            max_epoch,
            jwt_randomness,
            nonce,
        })
    }

    pub fn extended_public_key_base64(&self) -> String {
        extended_public_key_base64(&self.ephemeral_key.verifying_key())
    }

    /// Base64 Sui serialized signature (`flag || sig || pk`) over `message`
    pub fn sign_serialized(&self, message: &[u8]) -> String {
        let signature = self.ephemeral_key.sign(message);
        let mut bytes = Vec::with_capacity(1 + 64 + 32);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(self.ephemeral_key.verifying_key().as_bytes());
        STANDARD.encode(bytes)
    }

    /// Sign base64 transaction bytes under the Sui transaction intent
    pub fn sign_transaction(&self, tx_bytes: &str) -> Result<String> {
        let tx_bytes = STANDARD
            .decode(tx_bytes)
            .map_err(|err| ZkLoginError::InvalidRequest(format!("Bad txBytes: {err}")))?;
        let mut message = Vec::with_capacity(TRANSACTION_INTENT.len() + tx_bytes.len());
        message.extend_from_slice(&TRANSACTION_INTENT);
        message.extend_from_slice(&tx_bytes);
        let digest = blake2b_simd::Params::new().hash_length(32).hash(&message);
        Ok(self.sign_serialized(digest.as_bytes()))
    }

    fn to_record(&self) -> LocalSessionRecord {
        LocalSessionRecord {
            version: Some(LOCAL_SESSION_VERSION),
            ephemeral_secret_key: Some(STANDARD.encode(self.ephemeral_key.to_bytes())),
            max_epoch: Some(self.max_epoch),
            jwt_randomness: Some(self.jwt_randomness.to_string()),
            nonce: Some(self.nonce.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalSessionRecord {
    version: Option<u32>,
    ephemeral_secret_key: Option<String>,
    max_epoch: Option<u64>,
    jwt_randomness: Option<String>,
    nonce: Option<String>,
}

fn corrupt(reason: &str) -> ZkLoginError {
    ZkLoginError::Session(format!("corrupt local session: {reason}"))
}

impl LocalSessionRecord {
    fn into_session(self) -> Result<LocalSession> {
        if self.version != Some(LOCAL_SESSION_VERSION) {
            return Err(corrupt("unsupported version"));
        }
        let secret = self
            .ephemeral_secret_key
            .ok_or_else(|| corrupt("missing ephemeralSecretKey"))?;
        let secret: [u8; 32] = STANDARD
            .decode(secret)
            .map_err(|_| corrupt("bad ephemeralSecretKey"))?
            .try_into()
            .map_err(|_| corrupt("bad ephemeralSecretKey length"))?;
        let max_epoch = self.max_epoch.ok_or_else(|| corrupt("missing maxEpoch"))?;
        let jwt_randomness = self
            .jwt_randomness
            .ok_or_else(|| corrupt("missing jwtRandomness"))?
            .parse::<BigUint>()
            .map_err(|_| corrupt("bad jwtRandomness"))?;
        let nonce = self.nonce.ok_or_else(|| corrupt("missing nonce"))?;

        Ok(LocalSession {
            ephemeral_key: SigningKey::from_bytes(&secret),
            max_epoch,
            jwt_randomness,
            nonce,
        })
    }
}

fn decode_record(content: &str) -> Result<LocalSession> {
    let record: LocalSessionRecord =
        serde_json::from_str(content).map_err(|_| corrupt("not a session record"))?;
    record.into_session()
}

fn encode_record(session: &LocalSession) -> Result<String> {
    Ok(serde_json::to_string(&session.to_record())?)
}

/// Client-local storage for the single current session
pub trait LocalSessionStore: Send + Sync {
    /// `None` when no session was ever stored or it was cleared
    fn load(&self) -> Result<Option<LocalSession>>;
    /// Overwrite the stored session
    fn save(&self, session: &LocalSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// One JSON file, readable only by the owner
#[derive(Debug, Clone)]
pub struct FileLocalSessionStore {
    path: PathBuf,
}

impl FileLocalSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalSessionStore for FileLocalSessionStore {
    fn load(&self) -> Result<Option<LocalSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        decode_record(&content).map(Some)
    }

    fn save(&self, session: &LocalSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, encode_record(session)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        debug!(path = %self.path.display(), "local session saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store holding the encoded record
#[derive(Debug, Default)]
pub struct MemoryLocalSessionStore {
    record: Mutex<Option<String>>,
}

impl MemoryLocalSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalSessionStore for MemoryLocalSessionStore {
    fn load(&self) -> Result<Option<LocalSession>> {
        self.record.lock().as_deref().map(decode_record).transpose()
    }

    fn save(&self, session: &LocalSession) -> Result<()> {
        *self.record.lock() = Some(encode_record(session)?);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.record.lock() = None;
        Ok(())
    }
}

/// Start a login attempt: log out of the server, then store a fresh session
pub async fn create_local_session(
    backend: &dyn AuthBackend,
    store: &dyn LocalSessionStore,
    max_epoch: &dyn MaxEpochSource,
) -> Result<LocalSession> {
    backend.logout().await?;
    let max_epoch = max_epoch.max_epoch().await?;
    let session = LocalSession::generate(max_epoch)?;
    store.save(&session)?;
    info!(max_epoch, "local zkLogin session created");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("shinami-zklogin-test-{}", Uuid::new_v4()));
        path.push("session.json");
        path
    }

    #[test]
    fn test_file_store_lifecycle() {
        let path = temp_path();
        let store = FileLocalSessionStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let session = LocalSession::generate(10).unwrap();
        store.save(&session).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.nonce, session.nonce);
        assert_eq!(loaded.max_epoch, 10);
        assert_eq!(loaded.jwt_randomness, session.jwt_randomness);
        assert_eq!(loaded.ephemeral_key.to_bytes(), session.ephemeral_key.to_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();

        if let Some(parent) = path.parent() {
            fs::remove_dir_all(parent).unwrap();
        }
    }

    #[test]
    fn test_incomplete_record_is_corrupt() {
        let err = decode_record(r#"{"version":1,"maxEpoch":10}"#).unwrap_err();
        assert!(matches!(err, ZkLoginError::Session(_)));

        let err = decode_record(r#"{"version":2}"#).unwrap_err();
        assert!(matches!(err, ZkLoginError::Session(_)));

        assert!(decode_record("not json").is_err());
    }

    #[test]
    fn test_nonce_derived_from_parts() {
        let key = SigningKey::from_bytes(&[9; 32]);
        let a = LocalSession::from_parts(key.clone(), 10, BigUint::from(12345u32)).unwrap();
        let b = LocalSession::from_parts(key, 10, BigUint::from(12345u32)).unwrap();
        assert_eq!(a.nonce, b.nonce);
    }

    #[test]
    fn test_serialized_signature_layout() {
        let session = LocalSession::generate(1).unwrap();
        let bytes = STANDARD.decode(session.sign_serialized(b"msg")).unwrap();
        assert_eq!(bytes.len(), 97);
        assert_eq!(bytes[0], ED25519_FLAG);
        assert_eq!(&bytes[65..], session.ephemeral_key.verifying_key().as_bytes());
    }

    #[test]
    fn test_transaction_signature_verifies() {
        use ed25519_dalek::{Signature, Verifier};

        let session = LocalSession::generate(1).unwrap();
        let serialized = session.sign_transaction(&STANDARD.encode([1u8, 2, 3])).unwrap();
        let bytes = STANDARD.decode(serialized).unwrap();
        let signature = Signature::from_slice(&bytes[1..65]).unwrap();

        let digest = blake2b_simd::Params::new()
            .hash_length(32)
            .hash(&[0, 0, 0, 1, 2, 3]);
        assert!(session
            .ephemeral_key
            .verifying_key()
            .verify(digest.as_bytes(), &signature)
            .is_ok());
        assert!(session.sign_transaction("not base64!").is_err());
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryLocalSessionStore::new();
        let first = LocalSession::generate(1).unwrap();
        let second = LocalSession::generate(2).unwrap();
        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap().unwrap().nonce, second.nonce);
    }
}
