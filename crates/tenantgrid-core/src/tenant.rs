//! Tenants and the provisioning request that creates them.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::tier::{Tier, TierPolicy, TierProfile};

/// A customer organization isolated at the routing and compute level.
///
/// Immutable once a topology is built; a tier change means re-provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Routing key. Matched against the `tenantPath` header.
    pub tenant_id: String,
    /// Human label used for namespaces and resource names.
    pub tenant_name: String,
    pub tier: Tier,
}

impl Tenant {
    pub fn new(tenant_id: &str, tenant_name: &str, tier: Tier) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            tenant_name: tenant_name.to_string(),
            tier,
        }
    }

    /// Tenant name stripped to `[a-zA-Z0-9]`, used as a resource-name suffix.
    pub fn alphanumeric_name(&self) -> String {
        self.tenant_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect()
    }
}

/// Provisioning input delivered by the onboarding workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub tenant_id: String,
    pub tenant_name: String,
    pub tier: String,
    pub email: String,
    pub use_federation: String,
}

impl ProvisioningRequest {
    /// Validate required fields and resolve the tenant and its profile.
    ///
    /// The tier goes through [`TierPolicy::resolve`], so an unknown tier
    /// yields the basic profile instead of an error.
    pub fn resolve(&self) -> CoreResult<(Tenant, TierProfile)> {
        for (field, value) in [
            ("tenantId", &self.tenant_id),
            ("tenantName", &self.tenant_name),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Tenant(format!("{field} is required")));
            }
        }
        let profile = TierPolicy::resolve(&self.tier);
        let tenant = Tenant::new(self.tenant_id.trim(), self.tenant_name.trim(), profile.tier);
        Ok((tenant, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::IsolationMode;

    fn request(tier: &str) -> ProvisioningRequest {
        ProvisioningRequest {
            tenant_id: "t-100".to_string(),
            tenant_name: "acme-corp".to_string(),
            tier: tier.to_string(),
            email: "ops@acme.test".to_string(),
            use_federation: "false".to_string(),
        }
    }

    #[test]
    fn resolves_tenant_and_profile() {
        let (tenant, profile) = request("Premium").resolve().unwrap();
        assert_eq!(tenant.tenant_id, "t-100");
        assert_eq!(tenant.tier, Tier::Premium);
        assert_eq!(profile.isolation_mode, IsolationMode::Siloed);
    }

    #[test]
    fn unknown_tier_becomes_basic() {
        let (tenant, profile) = request("bronze").resolve().unwrap();
        assert_eq!(tenant.tier, Tier::Basic);
        assert!(!profile.requires_reverse_proxy);
    }

    #[test]
    fn missing_id_is_rejected() {
        let mut req = request("basic");
        req.tenant_id = " ".to_string();
        assert!(matches!(req.resolve(), Err(CoreError::Tenant(_))));
    }

    #[test]
    fn parses_camel_case_json() {
        let req: ProvisioningRequest = serde_json::from_str(
            r#"{"tenantId":"a","tenantName":"b","tier":"basic","email":"e","useFederation":"TRUE"}"#,
        )
        .unwrap();
        assert_eq!(req.tenant_name, "b");
        assert_eq!(req.use_federation, "TRUE");
    }

    #[test]
    fn alphanumeric_name_strips_symbols() {
        let t = Tenant::new("id", "acme-corp_01", Tier::Basic);
        assert_eq!(t.alphanumeric_name(), "acmecorp01");
    }
}
