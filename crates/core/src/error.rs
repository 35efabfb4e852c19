//! Persistence error model.

use thiserror::Error;

/// Result type used by storage ports.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a persistence adapter.
///
/// Adapters keep the driver's own message and error code. Classification
/// (connectivity vs. everything else) happens at the HTTP boundary, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("{message}")]
    Backend {
        message: String,
        code: Option<String>,
    },

    /// The store cannot scope several writes into one transaction.
    #[error("transactions are not supported by this store")]
    TransactionUnsupported,

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Driver-specific error code, when the backend reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
