//! Error Types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller supplied an unusable value (empty id, bad email, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store failed (network, lock poisoning, bad response)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backing store answered but is temporarily unable to serve the read
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event not accepted in the current poller phase
    #[error("Invalid transition: {event} while {phase}")]
    InvalidTransition { phase: String, event: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Unavailable(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => format!("Invalid request: {msg}"),
            Self::NotFound(_) => "The requested record was not found.".into(),
            Self::Storage(_) | Self::Unavailable(_) => {
                "The service is temporarily unavailable. Please try again.".into()
            }
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Storage(format!("lock poisoned: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CoreError::Storage("timeout".into()).is_retryable());
        assert!(CoreError::Unavailable("503".into()).is_retryable());
        assert!(!CoreError::NotFound("u1".into()).is_retryable());
        assert!(!CoreError::InvalidInput("empty".into()).is_retryable());
    }
}
