//! Tenant security group.
//!
//! One group per tenant holds all of its services. The shared load
//! balancer may reach only the externally reachable targets: every backend
//! port for pooled tenants, the proxy port alone for siloed ones. Members
//! of the group reach each other on the backend ports, which is how the
//! reverse proxy gets to its upstreams.

use serde::{Deserialize, Serialize};
use tenantgrid_core::Tenant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Security group the traffic comes from.
    pub source: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub ingress: Vec<IngressRule>,
}

impl SecurityGroupSpec {
    /// Group for a tenant, admitting `listener`'s load balancer on `ports`.
    pub fn for_tenant(tenant: &Tenant, listener: &str, ports: &[u16]) -> Self {
        let source = load_balancer_group(listener);
        let mut ingress: Vec<IngressRule> = Vec::with_capacity(ports.len());
        for &port in ports {
            if !ingress.iter().any(|r| r.port == port) {
                ingress.push(IngressRule {
                    source: source.clone(),
                    port,
                });
            }
        }
        Self {
            name: format!("tenant-sg-{}", tenant.tenant_id),
            ingress,
        }
    }

    /// Let members of this group reach each other on `ports`.
    pub fn allow_members(mut self, ports: &[u16]) -> Self {
        for &port in ports {
            if !self.allows(&self.name, port) {
                self.ingress.push(IngressRule {
                    source: self.name.clone(),
                    port,
                });
            }
        }
        self
    }

    pub fn allows(&self, source: &str, port: u16) -> bool {
        self.ingress.iter().any(|r| r.source == source && r.port == port)
    }
}

/// Security group of the shared load balancer behind `listener`.
pub fn load_balancer_group(listener: &str) -> String {
    format!("{listener}-sg")
}
