//! Domain types persisted by the TenantGrid state store.
//!
//! These are shared by the routing, topology, and gateway crates. All types
//! serialize to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use tenantgrid_core::Tier;

/// Header every routed request must carry; its value is the tenant id.
pub const TENANT_HEADER: &str = "tenantPath";

// ── Tenant mapping ────────────────────────────────────────────────

/// Which infrastructure generation currently owns a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantMappingRecord {
    pub tenant_id: String,
    /// Stack identity. Fixed at creation.
    pub stack_name: String,
    /// Source revision. The only field a redeploy updates.
    pub commit_id: String,
    /// Deployment wave. Fixed at creation.
    pub wave_number: u32,
}

// ── Routing rules ─────────────────────────────────────────────────

/// Conditions a request must satisfy for a rule to match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchConditions {
    pub header_name: String,
    pub header_value: String,
    /// URL prefix pattern (`/{service}*`); absent for proxy targets.
    pub path_pattern: Option<String>,
}

/// A target group a rule forwards to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TargetGroupRef {
    pub name: String,
    pub port: u16,
    pub health_check_path: String,
}

/// A listener rule forwarding one tenant's traffic to one target group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingRule {
    pub listener: String,
    pub tenant_id: String,
    pub service_name: String,
    /// Unique per listener, in `[1, 50000)`.
    pub priority: u32,
    pub conditions: MatchConditions,
    /// Single forward action.
    pub target_group: TargetGroupRef,
}

impl RoutingRule {
    /// Build the composite key for the listener rules table.
    pub fn table_key(&self) -> String {
        rule_key(&self.listener, self.priority)
    }

    pub fn targets_proxy(&self) -> bool {
        self.conditions.path_pattern.is_none()
    }
}

/// Composite key for a listener rule.
pub fn rule_key(listener: &str, priority: u32) -> String {
    format!("{listener}/{priority:05}")
}

// ── Topology ──────────────────────────────────────────────────────

/// Summary of a built tenant topology, kept for offboarding and listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyRecord {
    pub tenant_id: String,
    pub tenant_name: String,
    pub tier: Tier,
    pub namespace: String,
    pub listener: String,
    /// Deployed service names, proxy included.
    pub services: Vec<String>,
    /// Priorities of the rules registered for this tenant.
    pub rule_priorities: Vec<u32>,
    /// Unix timestamp (seconds) of the build.
    pub built_at: u64,
}
