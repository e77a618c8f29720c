//! tenantgrid-state — embedded state store for TenantGrid.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the tenant mapping
//! registry (which infrastructure generation owns a tenant), the rules
//! registered on each shared listener, and a record of every built
//! tenant topology.
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{listener}/{priority}`) enable prefix scans.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod registry;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use registry::{TenantRegistry, UpsertOutcome};
pub use store::StateStore;
pub use types::*;
