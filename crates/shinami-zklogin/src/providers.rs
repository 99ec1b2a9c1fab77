/*
[INPUT]:  Shinami node / zkwallet / zkprover clients, or caller closures
[OUTPUT]: Epoch, salt, proof, authorization and max-epoch collaborators
[POS]:    Provider layer - pluggable dependencies of the login flow
[UPDATE]: When adding collaborators or changing their inputs
*/

use std::future::Future;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::{Value, json};
use shinami_clients::sui::{
    EpochInfo, NodeClient, PartialZkLoginProof, ZkProverClient, ZkWalletClient,
};
use tracing::debug;

use crate::error::Result;
use crate::user::{OidProvider, ZkLoginUserId};

/// Current network epoch timing
#[async_trait]
pub trait EpochProvider: Send + Sync {
    async fn current_epoch(&self) -> Result<EpochInfo>;
}

/// Inputs for a salt lookup
#[derive(Debug, Clone)]
pub struct SaltRequest {
    pub jwt: String,
    pub user_id: ZkLoginUserId,
}

/// Wallet salt for an identity key; must be stable per identity
#[async_trait]
pub trait SaltProvider: Send + Sync {
    async fn get_salt(&self, request: SaltRequest) -> Result<BigUint>;
}

/// Inputs for a zkLogin proof
#[derive(Debug, Clone)]
pub struct ZkProofRequest {
    pub jwt: String,
    pub extended_ephemeral_public_key: String,
    pub max_epoch: u64,
    pub jwt_randomness: BigUint,
    pub salt: BigUint,
    pub key_claim_name: String,
}

#[async_trait]
pub trait ZkProofProvider: Send + Sync {
    async fn create_proof(&self, request: ZkProofRequest) -> Result<PartialZkLoginProof>;
}

/// Decides whether a verified user may log in.
///
/// `Some(context)` admits the user and stores `context` in the session.
#[async_trait]
pub trait UserAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        provider: OidProvider,
        user_id: &ZkLoginUserId,
        jwt_claims: &Value,
    ) -> Result<Option<Value>>;
}

/// Admits everyone with an empty auth context
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllUsers;

#[async_trait]
impl UserAuthorizer for AllowAllUsers {
    async fn authorize(
        &self,
        _provider: OidProvider,
        _user_id: &ZkLoginUserId,
        _jwt_claims: &Value,
    ) -> Result<Option<Value>> {
        Ok(Some(json!({})))
    }
}

/// Max epoch for a new local session
#[async_trait]
pub trait MaxEpochSource: Send + Sync {
    async fn max_epoch(&self) -> Result<u64>;
}

#[async_trait]
impl MaxEpochSource for u64 {
    async fn max_epoch(&self) -> Result<u64> {
        Ok(*self)
    }
}

/// Current epoch plus a fixed number of epochs
#[derive(Debug, Clone)]
pub struct RelativeMaxEpoch<E> {
    epochs: E,
    offset: u64,
}

impl<E: EpochProvider> RelativeMaxEpoch<E> {
    pub fn new(epochs: E, offset: u64) -> Self {
        Self { epochs, offset }
    }
}

#[async_trait]
impl<E: EpochProvider> MaxEpochSource for RelativeMaxEpoch<E> {
    async fn max_epoch(&self) -> Result<u64> {
        let current = self.epochs.current_epoch().await?;
        Ok(current.epoch + self.offset)
    }
}

/// Adapts an async closure to a provider trait
#[derive(Debug, Clone, Copy)]
pub struct FromFn<F>(F);

pub fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn(f)
}

impl<F> FromFn<F> {
    pub(crate) fn inner(&self) -> &F {
        &self.0
    }
}

#[async_trait]
impl<F, Fut> EpochProvider for FromFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<EpochInfo>> + Send + 'static,
{
    async fn current_epoch(&self) -> Result<EpochInfo> {
        (self.0)().await
    }
}

#[async_trait]
impl<F, Fut> SaltProvider for FromFn<F>
where
    F: Fn(SaltRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BigUint>> + Send + 'static,
{
    async fn get_salt(&self, request: SaltRequest) -> Result<BigUint> {
        (self.0)(request).await
    }
}

#[async_trait]
impl<F, Fut> ZkProofProvider for FromFn<F>
where
    F: Fn(ZkProofRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PartialZkLoginProof>> + Send + 'static,
{
    async fn create_proof(&self, request: ZkProofRequest) -> Result<PartialZkLoginProof> {
        (self.0)(request).await
    }
}

#[async_trait]
impl<F, Fut> UserAuthorizer for FromFn<F>
where
    F: Fn(OidProvider, ZkLoginUserId, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
{
    async fn authorize(
        &self,
        provider: OidProvider,
        user_id: &ZkLoginUserId,
        jwt_claims: &Value,
    ) -> Result<Option<Value>> {
        (self.0)(provider, user_id.clone(), jwt_claims.clone()).await
    }
}

#[async_trait]
impl<F, Fut> MaxEpochSource for FromFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<u64>> + Send + 'static,
{
    async fn max_epoch(&self) -> Result<u64> {
        (self.0)().await
    }
}

#[async_trait]
impl EpochProvider for NodeClient {
    async fn current_epoch(&self) -> Result<EpochInfo> {
        Ok(self.get_latest_epoch().await?)
    }
}

#[async_trait]
impl SaltProvider for ZkWalletClient {
    async fn get_salt(&self, request: SaltRequest) -> Result<BigUint> {
        let wallet = self
            .get_or_create_zklogin_wallet(&request.jwt, Some(&request.user_id.key_claim_name), None)
            .await?;
        debug!(address = %wallet.address, "zkLogin wallet resolved");
        Ok(wallet.salt)
    }
}

#[async_trait]
impl ZkProofProvider for ZkProverClient {
    async fn create_proof(&self, request: ZkProofRequest) -> Result<PartialZkLoginProof> {
        Ok(self
            .create_zklogin_proof(
                &request.jwt,
                request.max_epoch,
                &request.extended_ephemeral_public_key,
                &request.jwt_randomness,
                &request.salt,
                Some(&request.key_claim_name),
            )
            .await?)
    }
}
