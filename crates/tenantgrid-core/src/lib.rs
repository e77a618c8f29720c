//! tenantgrid-core — shared types for TenantGrid.
//!
//! - **`tier`** — the tier → topology-shape decision table
//! - **`tenant`** — tenants and provisioning requests
//! - **`manifest`** — the declarative backend service manifest
//! - **`config`** — `tenantgrid.toml` parsing

pub mod config;
pub mod error;
pub mod manifest;
pub mod tenant;
pub mod tier;

pub use config::TenantGridConfig;
pub use error::{CoreError, CoreResult};
pub use manifest::{BackendServiceSpec, ReverseProxySpec, ServiceManifest, StorageBinding};
pub use tenant::{ProvisioningRequest, Tenant};
pub use tier::{ComputeSubstrate, IsolationMode, Tier, TierPolicy, TierProfile};
