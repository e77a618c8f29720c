//! Topology error types.

use thiserror::Error;

/// Errors raised while planning or building a tenant topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("build plan has a cycle through: {}", .remaining.join(", "))]
    Cycle { remaining: Vec<String> },

    #[error("build plan node not found: {0}")]
    UnknownNode(String),

    #[error("build plan already has a node keyed {0}")]
    DuplicateNode(String),

    #[error("invalid policy template for {service}: {reason}")]
    Policy { service: String, reason: String },

    #[error("provisioning {node} failed: {reason}")]
    Provision { node: String, reason: String },

    #[error("routing error: {0}")]
    Routing(#[from] tenantgrid_routing::RoutingError),

    #[error("manifest error: {0}")]
    Core(#[from] tenantgrid_core::CoreError),
}

pub type TopologyResult<T> = Result<T, TopologyError>;
