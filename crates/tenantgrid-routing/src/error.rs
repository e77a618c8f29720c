//! Routing error types.

use thiserror::Error;

/// Errors raised while registering or removing listener rules.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("priority {priority} already in use on listener {listener}")]
    PriorityCollision { listener: String, priority: u32 },

    #[error("priority {0} is outside [1, 50000)")]
    InvalidPriority(u32),

    #[error(
        "no free priority for {tenant_id}/{service} on listener {listener} after {} attempts (tried {tried:?})",
        .tried.len()
    )]
    PriorityExhausted {
        listener: String,
        tenant_id: String,
        service: String,
        tried: Vec<u32>,
    },

    #[error("state store error: {0}")]
    State(#[from] tenantgrid_state::StateError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
