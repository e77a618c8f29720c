//! `tenantgrid offboard` — detach a tenant from the shared listener.

use serde::Serialize;
use tenantgrid_core::TenantGridConfig;
use tenantgrid_state::TenantRegistry;
use tracing::{info, warn};

use super::{open_listener, open_store};

#[derive(Debug, Serialize)]
pub struct OffboardReport {
    pub tenant_id: String,
    pub rules_removed: Vec<u32>,
    pub topology_removed: bool,
    pub registry_removed: bool,
}

pub async fn run(config: &TenantGridConfig, tenant_id: &str) -> anyhow::Result<OffboardReport> {
    let store = open_store(config)?;
    let listener = open_listener(config, &store)?;

    let removed = listener.remove_tenant(tenant_id).await?;
    let topology_removed = store.delete_topology(tenant_id)?;
    let registry_removed = TenantRegistry::new(store).remove(tenant_id)?;

    if removed.is_empty() && !topology_removed && !registry_removed {
        warn!(tenant_id, "nothing to offboard");
    } else {
        info!(tenant_id, rules = removed.len(), "tenant offboarded");
    }
    Ok(OffboardReport {
        tenant_id: tenant_id.to_string(),
        rules_removed: removed.iter().map(|r| r.priority).collect(),
        topology_removed,
        registry_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{provision, testutil};

    #[tokio::test]
    async fn offboarding_frees_rules_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        let args = provision::ProvisionArgs {
            tenant_id: "acme".to_string(),
            tenant_name: "acme".to_string(),
            tier: "basic".to_string(),
            email: String::new(),
            manifest: testutil::manifest(dir.path()),
            commit_id: "c1".to_string(),
            wave: 1,
        };
        let built = provision::run(&config, &args).await.unwrap();

        let report = run(&config, "acme").await.unwrap();
        let mut removed = report.rules_removed.clone();
        removed.sort_unstable();
        let mut expected = built.topology.rule_priorities.clone();
        expected.sort_unstable();
        assert_eq!(removed, expected);
        assert!(report.topology_removed);
        assert!(report.registry_removed);

        let store = open_store(&config).unwrap();
        assert!(store.list_rules(&config.routing.listener).unwrap().is_empty());
        assert!(store.get_topology("acme").unwrap().is_none());
    }

    #[tokio::test]
    async fn offboarding_unknown_tenant_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        let report = run(&config, "ghost").await.unwrap();
        assert!(report.rules_removed.is_empty());
        assert!(!report.topology_removed);
        assert!(!report.registry_removed);
    }
}
