//! `tenantgrid provision` — build a tenant's topology.
//!
//! A tenant that already has a topology record is not rebuilt: only its
//! registry commit id is updated, matching how a redeploy behaves. Asking
//! for a different tier is an error; the tenant must be offboarded first.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tenantgrid_core::{ProvisioningRequest, ServiceManifest, TenantGridConfig};
use tenantgrid_routing::RoutingRuleBuilder;
use tenantgrid_state::{TenantRegistry, TopologyRecord, UpsertOutcome};
use tenantgrid_topology::{service_dns_name, InMemoryProvisioner, ServiceTopologyBuilder};
use tracing::info;

use super::{open_listener, open_store};

pub struct ProvisionArgs {
    pub tenant_id: String,
    pub tenant_name: String,
    pub tier: String,
    pub email: String,
    pub manifest: PathBuf,
    pub commit_id: String,
    pub wave: u32,
}

#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    /// False when the tenant already had a topology.
    pub built: bool,
    pub registry: UpsertOutcome,
    pub topology: TopologyRecord,
    pub outputs: ProvisionOutputs,
}

/// What downstream onboarding steps need from a provisioned tenant.
#[derive(Debug, Serialize)]
pub struct ProvisionOutputs {
    pub api_url: String,
    pub user_pool_ref: String,
    pub service_dns_names: Vec<String>,
}

impl ProvisionOutputs {
    fn new(config: &TenantGridConfig, record: &TopologyRecord) -> Self {
        Self {
            api_url: config.edge.api_url.clone(),
            user_pool_ref: config.identity.user_pool_ref.clone(),
            service_dns_names: record
                .services
                .iter()
                .map(|s| service_dns_name(s, &record.namespace))
                .collect(),
        }
    }
}

pub fn stack_name(tenant_id: &str) -> String {
    format!("tenantgrid-tenant-{tenant_id}")
}

pub async fn run(config: &TenantGridConfig, args: &ProvisionArgs) -> anyhow::Result<ProvisionReport> {
    let request = ProvisioningRequest {
        tenant_id: args.tenant_id.clone(),
        tenant_name: args.tenant_name.clone(),
        tier: args.tier.clone(),
        email: args.email.clone(),
        use_federation: "false".to_string(),
    };
    let (tenant, profile) = request.resolve()?;
    let manifest = ServiceManifest::from_file(&args.manifest)?;

    let store = open_store(config)?;
    let registry = TenantRegistry::new(store.clone());

    if let Some(existing) = store.get_topology(&tenant.tenant_id)? {
        if existing.tier != tenant.tier {
            anyhow::bail!(
                "tenant {} is provisioned as {}; changing to {} requires `tenantgrid offboard --tenant-id {}` first",
                tenant.tenant_id,
                existing.tier,
                tenant.tier,
                tenant.tenant_id
            );
        }
        info!(tenant_id = %tenant.tenant_id, "tenant already provisioned, updating registry only");
        let outcome = registry.upsert(
            &tenant.tenant_id,
            &stack_name(&tenant.tenant_id),
            &args.commit_id,
            args.wave,
        )?;
        return Ok(ProvisionReport {
            built: false,
            registry: outcome,
            outputs: ProvisionOutputs::new(config, &existing),
            topology: existing,
        });
    }

    let listener = Arc::new(open_listener(config, &store)?);
    let builder = ServiceTopologyBuilder::new(InMemoryProvisioner::new(), listener)
        .with_rule_builder(RoutingRuleBuilder::from_config(&config.routing))
        .with_user_pool_ref(&config.identity.user_pool_ref);
    let topology = builder.build(&tenant, &profile, &manifest).await?;

    let record = topology.to_record(unix_now());
    store.put_topology(&record)?;
    let outcome = registry.upsert(
        &tenant.tenant_id,
        &stack_name(&tenant.tenant_id),
        &args.commit_id,
        args.wave,
    )?;

    info!(
        tenant_id = %record.tenant_id,
        tier = %record.tier,
        services = record.services.len(),
        rules = record.rule_priorities.len(),
        "tenant provisioned"
    );
    Ok(ProvisionReport {
        built: true,
        registry: outcome,
        outputs: ProvisionOutputs::new(config, &record),
        topology: record,
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil;
    use tenantgrid_core::Tier;

    fn args(dir: &std::path::Path, tenant: &str, tier: &str) -> ProvisionArgs {
        ProvisionArgs {
            tenant_id: tenant.to_string(),
            tenant_name: tenant.to_string(),
            tier: tier.to_string(),
            email: format!("admin@{tenant}.example"),
            manifest: testutil::manifest(dir),
            commit_id: "c1".to_string(),
            wave: 1,
        }
    }

    #[tokio::test]
    async fn provisions_pooled_and_siloed_tenants() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());

        let basic = run(&config, &args(dir.path(), "acme", "basic")).await.unwrap();
        assert!(basic.built);
        assert_eq!(basic.registry, UpsertOutcome::Created);
        assert_eq!(basic.topology.tier, Tier::Basic);
        assert_eq!(basic.topology.rule_priorities.len(), 2);
        assert_eq!(
            basic.outputs.service_dns_names,
            vec!["orders-api.acme.sc", "users-api.acme.sc"]
        );
        assert_eq!(basic.outputs.api_url, config.edge.api_url);

        let premium = run(&config, &args(dir.path(), "acme2", "premium")).await.unwrap();
        assert_eq!(premium.topology.rule_priorities.len(), 1);
        assert!(premium.topology.services.contains(&"rproxy".to_string()));

        let mut all: Vec<u32> = basic.topology.rule_priorities.clone();
        all.extend(&premium.topology.rule_priorities);
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn reprovisioning_only_updates_the_commit() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        let first = run(&config, &args(dir.path(), "acme", "basic")).await.unwrap();

        let mut again = args(dir.path(), "acme", "basic");
        again.commit_id = "c2".to_string();
        again.wave = 7;
        let second = run(&config, &again).await.unwrap();
        assert!(!second.built);
        assert_eq!(second.registry, UpsertOutcome::Updated);
        assert_eq!(second.topology, first.topology);

        let store = open_store(&config).unwrap();
        let record = TenantRegistry::new(store).get("acme").unwrap().unwrap();
        assert_eq!(record.commit_id, "c2");
        assert_eq!(record.wave_number, 1);
    }

    #[tokio::test]
    async fn tier_change_requires_offboarding() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        run(&config, &args(dir.path(), "acme", "basic")).await.unwrap();

        let err = run(&config, &args(dir.path(), "acme", "premium")).await.unwrap_err();
        assert!(err.to_string().contains("offboard"));

        let store = open_store(&config).unwrap();
        assert_eq!(store.get_topology("acme").unwrap().unwrap().tier, Tier::Basic);
        let record = TenantRegistry::new(store).get("acme").unwrap().unwrap();
        assert_eq!(record.commit_id, "c1");
    }

    #[tokio::test]
    async fn missing_tenant_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        let mut bad = args(dir.path(), "acme", "basic");
        bad.tenant_id = " ".to_string();
        assert!(run(&config, &bad).await.is_err());
    }
}
