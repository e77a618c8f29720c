//! tenantgrid-topology — per-tenant infrastructure topology.
//!
//! Turns a tenant, its tier profile and the service manifest into an
//! explicit build plan and applies it.
//!
//! # Architecture
//!
//! ```text
//! ServiceTopologyBuilder
//!   ├── plan()  → BuildPlan (DAG of resource specs)
//!   ├── build() → topological order
//!   │     ├── Provisioner (namespace, security group, tables, roles,
//!   │     │                task definitions, services, target groups,
//!   │     │                scaling policies)
//!   │     └── RoutingRuleBuilder → shared Listener (listener rules)
//!   └── ServiceTopology → TopologyRecord (state store)
//! ```

pub mod autoscaling;
pub mod builder;
pub mod error;
pub mod namespace;
pub mod plan;
pub mod provisioner;
pub mod security;
pub mod storage;
pub mod task;

pub use autoscaling::{ScaleDecision, ScalingPolicy, Utilization};
pub use builder::{DeployedService, ServiceTopology, ServiceTopologyBuilder};
pub use error::{TopologyError, TopologyResult};
pub use namespace::{service_dns_name, ServiceConnect, ServiceDiscovery};
pub use plan::{BuildPlan, NodeId, PlanNode, Resource, ResourceKind};
pub use provisioner::{arn_for, InMemoryProvisioner, ProvisionedResource, Provisioner};
pub use security::SecurityGroupSpec;
pub use storage::{TableSpec, TaskRoleSpec};
pub use task::{ServiceSpec, TaskDefinitionSpec};
