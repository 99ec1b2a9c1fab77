/*
[INPUT]:  Login requests, epoch/salt/proof providers, key sets, allowed apps
[OUTPUT]: Authenticated zkLogin users with their approximate session expiry
[POS]:    Server layer - ordered login and wallet derivation protocol
[UPDATE]: When login checks are added or reordered
*/

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, Result};
use crate::oidc::{KeySetSource, verify_jwt};
use crate::providers::{
    AllowAllUsers, EpochProvider, SaltProvider, SaltRequest, UserAuthorizer, ZkProofProvider,
    ZkProofRequest,
};
use crate::session::MAX_EXPIRES_AT_MS;
use crate::user::{OidProvider, ZkLoginProof, ZkLoginRequest, ZkLoginUser, ZkLoginUserId};
use crate::zk::{
    compute_address_from_seed, extended_public_key, extended_public_key_base64, gen_address_seed,
    generate_nonce,
};

/// OAuth application ids (token audiences) accepted per provider
pub type AllowedApps = HashMap<OidProvider, Vec<String>>;

/// A successful login, not yet persisted
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: ZkLoginUser,
    /// Approximate unix millis at which `max_epoch` ends, capped at year 9999
    pub expires_at_ms: u64,
}

/// Runs the login protocol against pluggable collaborators
#[derive(Clone)]
pub struct LoginHandler {
    epochs: Arc<dyn EpochProvider>,
    salts: Arc<dyn SaltProvider>,
    prover: Arc<dyn ZkProofProvider>,
    key_sets: Arc<dyn KeySetSource>,
    authorizer: Arc<dyn UserAuthorizer>,
    allowed_apps: AllowedApps,
}

impl LoginHandler {
    pub fn new(
        epochs: Arc<dyn EpochProvider>,
        salts: Arc<dyn SaltProvider>,
        prover: Arc<dyn ZkProofProvider>,
        key_sets: Arc<dyn KeySetSource>,
        allowed_apps: AllowedApps,
    ) -> Self {
        Self {
            epochs,
            salts,
            prover,
            key_sets,
            authorizer: Arc::new(AllowAllUsers),
            allowed_apps,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn UserAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn epochs(&self) -> &Arc<dyn EpochProvider> {
        &self.epochs
    }

    /// Providers with at least one allowed app
    pub fn enabled_providers(&self) -> Vec<OidProvider> {
        let mut providers: Vec<_> = self
            .allowed_apps
            .iter()
            .filter(|(_, apps)| !apps.is_empty())
            .map(|(provider, _)| *provider)
            .collect();
        providers.sort();
        providers
    }

    fn allowed_apps_for(&self, provider: OidProvider) -> Option<&[String]> {
        self.allowed_apps
            .get(&provider)
            .map(Vec::as_slice)
            .filter(|apps| !apps.is_empty())
    }

    /// Verify the request and derive the user's wallet and proof.
    ///
    /// Each check runs before any later collaborator is called; nothing is
    /// persisted here.
    pub async fn login(&self, request: &ZkLoginRequest) -> Result<LoginOutcome> {
        let provider = request.oid_provider;
        let parsed = request.parse()?;

        let Some(apps) = self.allowed_apps_for(provider) else {
            warn!(provider = %provider, "login for disabled provider");
            return Err(AuthError::ProviderDisabled(provider.to_string()).into());
        };

        let current = self.epochs.current_epoch().await?;
        let valid_epochs = i128::from(request.max_epoch) - i128::from(current.epoch) + 1;
        if valid_epochs <= 0 {
            warn!(
                epoch = current.epoch,
                max_epoch = request.max_epoch,
                "login with expired max epoch"
            );
            return Err(AuthError::MaxEpochExpired.into());
        }
        let valid_epochs = u64::try_from(valid_epochs).unwrap_or(u64::MAX);
        let expires_at_ms = current
            .epoch_start_timestamp_ms
            .saturating_add(current.epoch_duration_ms.saturating_mul(valid_epochs))
            .min(MAX_EXPIRES_AT_MS);

        let jwt = verify_jwt(
            self.key_sets.as_ref(),
            provider,
            &request.jwt,
            &parsed.key_claim_name,
        )
        .await?;

        let nonce = generate_nonce(
            &extended_public_key(&parsed.ephemeral_public_key),
            request.max_epoch,
            &parsed.jwt_randomness,
        )?;
        if jwt.nonce != nonce {
            warn!(provider = %provider, "jwt nonce mismatch");
            return Err(AuthError::InvalidNonce.into());
        }

        let user_id = ZkLoginUserId {
            iss: jwt.iss.clone(),
            aud: jwt.aud.clone(),
            key_claim_name: parsed.key_claim_name.clone(),
            key_claim_value: jwt.key_claim_value.clone(),
        };

        if !apps.iter().any(|app| *app == user_id.aud) {
            warn!(provider = %provider, aud = %user_id.aud, "application not allowed");
            return Err(AuthError::AppNotAllowed(user_id.aud.clone()).into());
        }
        let Some(auth_context) = self
            .authorizer
            .authorize(provider, &user_id, &jwt.claims)
            .await?
        else {
            warn!(provider = %provider, "user not authorized");
            return Err(AuthError::UserNotAuthorized.into());
        };

        let salt = self
            .salts
            .get_salt(SaltRequest {
                jwt: request.jwt.clone(),
                user_id: user_id.clone(),
            })
            .await?;

        let address_seed = gen_address_seed(
            &salt,
            &user_id.key_claim_name,
            &user_id.key_claim_value,
            &user_id.aud,
        )?;
        let wallet = compute_address_from_seed(&address_seed, &user_id.iss)?;

        let partial = self
            .prover
            .create_proof(ZkProofRequest {
                jwt: request.jwt.clone(),
                extended_ephemeral_public_key: extended_public_key_base64(
                    &parsed.ephemeral_public_key,
                ),
                max_epoch: request.max_epoch,
                jwt_randomness: parsed.jwt_randomness,
                salt,
                key_claim_name: parsed.key_claim_name,
            })
            .await?;

        info!(provider = %provider, wallet = %wallet, max_epoch = request.max_epoch, "zkLogin succeeded");
        Ok(LoginOutcome {
            user: ZkLoginUser {
                id: user_id,
                oid_provider: provider,
                jwt_claims: jwt.claims,
                auth_context,
                max_epoch: request.max_epoch,
                wallet,
                zk_proof: ZkLoginProof::new(partial, &address_seed),
            },
            expires_at_ms,
        })
    }
}
