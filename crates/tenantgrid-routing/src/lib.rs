//! TenantGrid routing — the shared listener and the rules tenants attach to it.
//!
//! Every tenant, pooled or siloed, registers rules on one shared load
//! balancer listener. Rule priorities are a listener-wide resource, so
//! allocation and registration happen under the listener's lock.
//!
//! # Components
//!
//! - **`allocator`** — pluggable priority allocators (random draw, sequential, tenant hash)
//! - **`listener`** — the shared listener: compare-and-swap registration and request dispatch
//! - **`matcher`** — header and path-pattern condition matching
//! - **`builder`** — builds a tenant's rule for one service or for its reverse proxy

pub mod allocator;
pub mod builder;
pub mod error;
pub mod listener;
pub mod matcher;

pub use allocator::{
    allocator_for, Occupied, RandomDraw, RuleAllocator, RuleKey, ScriptedAllocator, Sequential,
    TenantHash, PRIORITY_SPACE,
};
pub use builder::{target_group_name, RoutingRuleBuilder, TargetService, DEFAULT_MAX_ATTEMPTS};
pub use error::{RoutingError, RoutingResult};
pub use listener::{Listener, RouteDecision, RouteRequest, RuleDraft, DEFAULT_ACTION_STATUS};
