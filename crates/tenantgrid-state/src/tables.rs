//! redb table definitions for the TenantGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Tenant mapping records keyed by `{tenant_id}`.
pub const TENANT_MAPPINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tenant_mappings");

/// Listener rules keyed by `{listener}/{priority:05}`.
pub const LISTENER_RULES: TableDefinition<&str, &[u8]> = TableDefinition::new("listener_rules");

/// Built topologies keyed by `{tenant_id}`.
pub const TOPOLOGIES: TableDefinition<&str, &[u8]> = TableDefinition::new("topologies");
