//! Registry error type

use gridcast_core::domain::job::JobStatus;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Referenced job, host, or registration does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input, reported to the immediate caller
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested job status change violates the lifecycle state machine
    #[error("illegal job status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// The durable store could not complete the operation. Transient; the
    /// caller decides whether to retry.
    #[error("registry unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

impl RegistryError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is a transient store failure
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
