use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the worker process
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ledger access errors, shared by reads and transaction submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain unavailable during {op}: {reason}")]
    Unavailable { op: &'static str, reason: String },

    #[error("Call reverted: {0}")]
    CallReverted(String),

    #[error("Insufficient funds for gas: {0}")]
    InsufficientFunds(String),

    #[error("RPC error during {op}: {reason}")]
    Rpc { op: &'static str, reason: String },

    #[error("Failed to decode {op} response: {reason}")]
    Decode { op: &'static str, reason: String },
}

/// Coarse error taxonomy used for logging and skip decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ChainUnavailable,
    CallReverted,
    InsufficientFunds,
    ConfigurationMissing,
    Other,
}

impl ChainError {
    pub fn unavailable(op: &'static str, reason: impl ToString) -> Self {
        ChainError::Unavailable {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Unavailable { .. } => ErrorKind::ChainUnavailable,
            ChainError::CallReverted(_) => ErrorKind::CallReverted,
            ChainError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            ChainError::Rpc { .. } | ChainError::Decode { .. } => ErrorKind::Other,
        }
    }

    /// Map a JSON-RPC error response message onto the taxonomy.
    ///
    /// Node implementations disagree on wording, so matching is done on
    /// lowercase substrings.
    pub fn from_rpc_message(op: &'static str, message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("insufficient funds") {
            ChainError::InsufficientFunds(message.to_string())
        } else if lowered.contains("revert") {
            ChainError::CallReverted(message.to_string())
        } else {
            ChainError::Rpc {
                op,
                reason: message.to_string(),
            }
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Chain(e) => e.kind(),
            AppError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            _ => ErrorKind::Other,
        }
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Chain(ref e) => (
                StatusCode::BAD_GATEWAY,
                "CHAIN_ERROR",
                e.to_string(),
                Some(serde_json::json!({ "kind": e.kind() })),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                msg,
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for ledger access
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_message_classification() {
        let err = ChainError::from_rpc_message(
            "send_transaction",
            "insufficient funds for gas * price + value",
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let err = ChainError::from_rpc_message(
            "estimate_gas",
            "execution reverted: InheritanceFactory__ContractAlreadyInactive",
        );
        assert_eq!(err.kind(), ErrorKind::CallReverted);

        let err = ChainError::from_rpc_message("estimate_gas", "nonce too low");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_app_error_kind_passthrough() {
        let err: AppError = ChainError::unavailable("get_balance", "connection refused").into();
        assert_eq!(err.kind(), ErrorKind::ChainUnavailable);
        assert_eq!(
            AppError::ConfigurationMissing("RPC_URL".into()).kind(),
            ErrorKind::ConfigurationMissing
        );
    }
}
