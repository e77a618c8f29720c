//! tenantgrid-gateway — the shared edge API.
//!
//! - **`edge`** — `GatewayBridge` builds the edge descriptor: routes, VPC link
//!   integration, `tenantPath` header mapping
//! - **`authorizer`** — bearer JWT validation, tier → API key, per-role service access
//! - **`usage_plan`** — per-tier quotas and throttling
//! - **`server`** — axum edge emulator over the shared listener

pub mod authorizer;
pub mod edge;
pub mod error;
pub mod server;
pub mod usage_plan;

pub use authorizer::{Authorizer, AuthorizerContext};
pub use edge::{EdgeDescriptor, EdgeRoute, ForwardedRequest, GatewayBridge, TENANT_PATH_HEADER};
pub use error::{GatewayError, GatewayResult};
pub use server::{build_router, EdgeState};
pub use usage_plan::{ApiKey, UsagePlan};
