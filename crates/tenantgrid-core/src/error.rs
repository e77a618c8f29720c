//! Error types for core parsing and validation.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing tiers, manifests, and config files.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown tier: {0:?}")]
    UnknownTier(String),

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid service manifest: {0}")]
    Manifest(String),

    #[error("invalid tenant: {0}")]
    Tenant(String),
}
