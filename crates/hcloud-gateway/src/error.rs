//! Gateway error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::types::Operation;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors returned by [`crate::ServerGateway`]. Every variant names the
/// operation and the identifier it targeted.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The API answered and the server does not exist.
    #[error("{operation} {target}: not found")]
    NotFound { operation: Operation, target: String },

    /// The API could not be reached, refused the call, or failed it.
    #[error("{operation} {target} failed: {source}")]
    Transport {
        operation: Operation,
        target: String,
        #[source]
        source: ApiError,
    },

    /// The caller's cancellation signal fired before the call completed.
    #[error("{operation} {target}: cancelled")]
    Cancelled { operation: Operation, target: String },

    /// The caller's deadline passed before the call completed.
    #[error("{operation} {target}: deadline exceeded")]
    DeadlineExceeded { operation: Operation, target: String },

    /// The target was rejected before any call was made.
    #[error("{operation} {target:?}: {reason}")]
    InvalidTarget {
        operation: Operation,
        target: String,
        reason: &'static str,
    },
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    /// Whether the call was attempted and failed for a reason other than
    /// absence.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. }
                | GatewayError::Cancelled { .. }
                | GatewayError::DeadlineExceeded { .. }
        )
    }

    pub fn operation(&self) -> Operation {
        match self {
            GatewayError::NotFound { operation, .. }
            | GatewayError::Transport { operation, .. }
            | GatewayError::Cancelled { operation, .. }
            | GatewayError::DeadlineExceeded { operation, .. }
            | GatewayError::InvalidTarget { operation, .. } => *operation,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            GatewayError::NotFound { target, .. }
            | GatewayError::Transport { target, .. }
            | GatewayError::Cancelled { target, .. }
            | GatewayError::DeadlineExceeded { target, .. }
            | GatewayError::InvalidTarget { target, .. } => target,
        }
    }
}
