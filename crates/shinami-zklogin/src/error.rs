/*
[INPUT]:  Failures from login steps, session storage, remote services and crypto
[OUTPUT]: Typed zkLogin errors with HTTP status mapping and public messages
[POS]:    Error layer - shared by server routes, login handler and client flows
[UPDATE]: When adding login failure reasons or new error sources
*/

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use shinami_clients::ShinamiError;
use thiserror::Error;
use tracing::{debug, error};

use crate::callback::CallbackStatus;

/// Login rejected for a protocol reason; reported to the caller with 400
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("OpenID provider disabled: {0}")]
    ProviderDisabled(String),
    #[error("maxEpoch expired")]
    MaxEpochExpired,
    #[error("Bad jwt")]
    BadJwt,
    #[error("Invalid jwt nonce")]
    InvalidNonce,
    #[error("Application not allowed: {0}")]
    AppNotAllowed(String),
    #[error("User not authorized")]
    UserNotAuthorized,
}

/// Main error type for zkLogin flows
#[derive(Error, Debug)]
pub enum ZkLoginError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Malformed request body or parameters
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated session outlived its max epoch
    #[error("maxEpoch expired")]
    SessionExpired,

    #[error("Bad method")]
    BadMethod,

    #[error("Sub-path not found")]
    NotFound,

    /// Signed transaction did not execute successfully
    #[error("Tx execution failed: {0}")]
    TxFailed(String),

    #[error("Shinami service error: {0}")]
    Client(#[from] ShinamiError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Stored session data could not be read back
    #[error("Session error: {0}")]
    Session(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Non-2xx answer from the auth API
    #[error("API error (status {status}): {error}")]
    Api { status: u16, error: String },
}

impl ZkLoginError {
    /// HTTP status the error maps to at the route boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            ZkLoginError::Auth(_) | ZkLoginError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ZkLoginError::Unauthorized | ZkLoginError::SessionExpired => StatusCode::UNAUTHORIZED,
            ZkLoginError::NotFound => StatusCode::NOT_FOUND,
            ZkLoginError::BadMethod => StatusCode::METHOD_NOT_ALLOWED,
            ZkLoginError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to callers; internal details stay in logs
    pub fn public_message(&self) -> String {
        match self {
            ZkLoginError::Auth(_)
            | ZkLoginError::InvalidRequest(_)
            | ZkLoginError::Unauthorized
            | ZkLoginError::SessionExpired
            | ZkLoginError::BadMethod
            | ZkLoginError::NotFound
            | ZkLoginError::TxFailed(_) => self.to_string(),
            ZkLoginError::Api { error, .. } => error.clone(),
            _ => "Internal error".to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error() && !matches!(self, ZkLoginError::TxFailed(_))
    }
}

/// Status plus `{error}` body; internal details are logged only
impl IntoResponse for ZkLoginError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            error!(error = %self, "Unhandled error");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        let body = ApiErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Why a provider callback could not complete the login
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("No local zkLogin session")]
    NoLocalSession,
    #[error("Bad nonce")]
    BadNonce,
    #[error("Missing id_token")]
    MissingIdToken,
    #[error("Bad callback state: {0}")]
    BadState(String),
    #[error("Local session unreadable: {0}")]
    LocalSession(ZkLoginError),
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: CallbackStatus,
        to: CallbackStatus,
    },
    #[error("Login failed: {0}")]
    Login(#[from] ZkLoginError),
}

/// JSON error body returned by every route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Result type alias for zkLogin operations
pub type Result<T> = std::result::Result<T, ZkLoginError>;
