//! Gateway error types.

use thiserror::Error;

/// Errors raised at the edge.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing Authorization header")]
    MissingToken,

    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token is missing claim {0}")]
    MissingClaim(String),

    #[error("no route for {method} {path}")]
    NoRoute { method: String, path: String },

    #[error("role {role:?} may not call service {service}")]
    ServiceNotAllowed { service: String, role: String },
}

impl GatewayError {
    /// Whether the caller failed authentication, as opposed to authorization.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingToken
                | GatewayError::MalformedHeader
                | GatewayError::InvalidToken(_)
                | GatewayError::MissingClaim(_)
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
