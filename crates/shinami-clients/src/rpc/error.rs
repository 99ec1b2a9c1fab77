/*
[INPUT]:  Error sources (HTTP transport, JSON-RPC error objects, serialization, inputs)
[OUTPUT]: Structured error type with JSON-RPC detail inspection helpers
[POS]:    RPC layer - unified error type for every Shinami client
[UPDATE]: When adding new error sources or new remote error classifications
*/

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code for invalid params; Shinami services also use it for
/// expired session tokens and duplicate wallet ids.
pub const INVALID_PARAMS_CODE: i64 = -32602;

/// Structured `data` payload attached to Shinami RPC errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub details: String,
}

/// Main error type for Shinami clients
#[derive(Error, Debug)]
pub enum ShinamiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a JSON-RPC error object
    #[error("RPC error (code {code}): {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Service answered with a non-success HTTP status and no JSON-RPC body
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Caller supplied an argument the service cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ShinamiError {
    /// Extract `{details}` from an RPC error's data, if it has that shape
    pub fn error_details(&self) -> Option<ErrorDetails> {
        match self {
            ShinamiError::Rpc {
                data: Some(data), ..
            } => serde_json::from_value(data.clone()).ok(),
            _ => None,
        }
    }

    /// RPC error code, if this is an RPC error
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            ShinamiError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if the service rejected the request params
    pub fn is_invalid_params(&self) -> bool {
        self.rpc_code() == Some(INVALID_PARAMS_CODE)
    }

    /// Check for an invalid-params error whose details contain `needle`
    pub fn details_contain(&self, needle: &str) -> bool {
        self.is_invalid_params()
            && self
                .error_details()
                .is_some_and(|details| details.details.contains(needle))
    }

    /// Check if the session token used for the call has expired or is invalid
    pub fn is_bad_session_token(&self) -> bool {
        self.details_contain("Bad session token")
    }

    /// Check if a wallet creation collided with an existing wallet id
    pub fn is_wallet_id_taken(&self) -> bool {
        self.details_contain("Wallet ID already exists")
    }

    /// Check if the error is a transport-level failure worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ShinamiError::Http(err) => err.is_timeout() || err.is_connect(),
            ShinamiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        ShinamiError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for Shinami client operations
pub type Result<T> = std::result::Result<T, ShinamiError>;
