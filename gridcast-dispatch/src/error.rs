//! Error types for the dispatch sweep

use std::collections::HashMap;

use gridcast_registry::RegistryError;
use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors that can occur when dispatching a request across the cluster
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every candidate host was tried and none returned an acceptable
    /// outcome. This is a normal, expected result when the whole cluster is
    /// busy or down; the per-host failure map is for diagnostics, not for
    /// re-raising.
    #[error("no host produced an acceptable response for '{service_type}' ({} tried)", .failures.len())]
    Exhausted {
        service_type: String,
        /// Failure reason per attempted host
        failures: HashMap<String, String>,
    },

    /// The registry could not supply the candidate list
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DispatchError {
    /// Check if this error is the expected swept-everything-without-luck
    /// outcome rather than a registry failure.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
