//! RoutingRuleBuilder — one listener rule per tenant-facing target.
//!
//! Pooled tenants get a rule per backend service, matched on the tenant
//! header plus a `/{service}*` path prefix. Siloed tenants get a single
//! rule, matched on the tenant header alone, pointing at their reverse
//! proxy which fans out internally.

use tenantgrid_core::config::RoutingConfig;
use tenantgrid_core::Tenant;
use tenantgrid_state::{MatchConditions, RoutingRule, TargetGroupRef, TENANT_HEADER};
use tracing::info;

use crate::error::RoutingResult;
use crate::listener::{Listener, RuleDraft};

/// Default number of priority proposals before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The service a rule forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetService {
    pub name: String,
    pub port: u16,
}

impl TargetService {
    pub fn new(name: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            port,
        }
    }
}

/// Builds and registers tenant routing rules on the shared listener.
#[derive(Debug, Clone)]
pub struct RoutingRuleBuilder {
    max_attempts: u32,
}

impl Default for RoutingRuleBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RoutingRuleBuilder {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The rule (without a priority) a tenant needs for one target.
    pub fn draft(
        &self,
        tenant: &Tenant,
        service: &TargetService,
        is_reverse_proxy_target: bool,
    ) -> RuleDraft {
        let (path_pattern, health_check_path) = if is_reverse_proxy_target {
            (None, "/health".to_string())
        } else {
            (
                Some(format!("/{}*", service.name)),
                format!("/{}/health", service.name),
            )
        };

        RuleDraft {
            tenant_id: tenant.tenant_id.clone(),
            service_name: service.name.clone(),
            conditions: MatchConditions {
                header_name: TENANT_HEADER.to_string(),
                header_value: tenant.tenant_id.clone(),
                path_pattern,
            },
            target_group: TargetGroupRef {
                name: target_group_name(&service.name, &tenant.tenant_id),
                port: service.port,
                health_check_path,
            },
        }
    }

    /// Draft the rule, allocate a priority and register it on the listener.
    pub async fn build_rule(
        &self,
        tenant: &Tenant,
        service: &TargetService,
        listener: &Listener,
        is_reverse_proxy_target: bool,
    ) -> RoutingResult<RoutingRule> {
        let draft = self.draft(tenant, service, is_reverse_proxy_target);
        let rule = listener
            .allocate_and_register(&draft, self.max_attempts)
            .await?;

        info!(
            tenant_id = %tenant.tenant_id,
            service = %service.name,
            listener = listener.name(),
            priority = rule.priority,
            proxy = is_reverse_proxy_target,
            "routing rule built"
        );
        Ok(rule)
    }
}

/// Target group name for a service of a tenant.
pub fn target_group_name(service: &str, tenant_id: &str) -> String {
    format!("tg-{service}-{tenant_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{RandomDraw, ScriptedAllocator, Sequential};
    use crate::error::RoutingError;
    use crate::listener::{RouteDecision, RouteRequest};
    use std::collections::HashSet;
    use std::sync::Arc;
    use tenantgrid_core::Tier;

    fn acme() -> Tenant {
        Tenant::new("acme", "acme", Tier::Basic)
    }

    #[tokio::test]
    async fn pooled_rule_has_header_and_path() {
        let listener = Listener::new("alb", Box::new(Sequential));
        let rule = RoutingRuleBuilder::default()
            .build_rule(&acme(), &TargetService::new("orders", 3010), &listener, false)
            .await
            .unwrap();

        assert_eq!(rule.conditions.header_name, "tenantPath");
        assert_eq!(rule.conditions.header_value, "acme");
        assert_eq!(rule.conditions.path_pattern.as_deref(), Some("/orders*"));
        assert_eq!(rule.target_group.name, "tg-orders-acme");
        assert_eq!(rule.target_group.health_check_path, "/orders/health");
        assert!((1..50_000).contains(&rule.priority));
    }

    #[tokio::test]
    async fn proxy_rule_has_no_path() {
        let listener = Listener::new("alb", Box::new(Sequential));
        let tenant = Tenant::new("acme2", "acme2", Tier::Premium);
        let rule = RoutingRuleBuilder::default()
            .build_rule(&tenant, &TargetService::new("rproxy", 80), &listener, true)
            .await
            .unwrap();

        assert!(rule.conditions.path_pattern.is_none());
        assert!(rule.targets_proxy());
        assert_eq!(rule.conditions.header_value, "acme2");
        assert_eq!(rule.target_group.name, "tg-rproxy-acme2");
        assert_eq!(rule.target_group.health_check_path, "/health");
    }

    #[tokio::test]
    async fn forced_collision_fails_explicitly() {
        let listener = Listener::new("alb", Box::new(ScriptedAllocator::new([77])));
        let builder = RoutingRuleBuilder::new(3);
        builder
            .build_rule(&acme(), &TargetService::new("orders", 3010), &listener, false)
            .await
            .unwrap();
        let err = builder
            .build_rule(&acme(), &TargetService::new("products", 3020), &listener, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::PriorityExhausted { ref tried, .. } if tried.len() == 3));
    }

    #[tokio::test]
    async fn concurrent_tenants_never_share_a_priority() {
        let listener = Arc::new(Listener::new("alb", Box::new(RandomDraw::seeded(3))));
        let builder = RoutingRuleBuilder::new(8);
        let mut handles = Vec::new();
        for i in 0..20 {
            let listener = listener.clone();
            let builder = builder.clone();
            handles.push(tokio::spawn(async move {
                let tenant = Tenant::new(&format!("t{i}"), &format!("t{i}"), Tier::Basic);
                let mut priorities = Vec::new();
                for svc in ["orders", "products"] {
                    let rule = builder
                        .build_rule(&tenant, &TargetService::new(svc, 3010), &listener, false)
                        .await
                        .unwrap();
                    priorities.push(rule.priority);
                }
                priorities
            }));
        }
        let mut seen = HashSet::new();
        for h in handles {
            for p in h.await.unwrap() {
                assert!(seen.insert(p), "priority {p} assigned twice");
            }
        }
        assert_eq!(seen.len(), 40);
        assert_eq!(listener.snapshot().await.len(), 40);
    }

    #[tokio::test]
    async fn built_rules_route_tenant_traffic() {
        let listener = Listener::new("alb", Box::new(Sequential));
        let builder = RoutingRuleBuilder::default();
        builder
            .build_rule(&acme(), &TargetService::new("orders", 3010), &listener, false)
            .await
            .unwrap();

        let ok = RouteRequest::new("/orders/5").header("tenantPath", "acme");
        assert!(matches!(
            listener.route(&ok).await,
            RouteDecision::Forward { ref target_group, .. } if target_group.name == "tg-orders-acme"
        ));
        let other = RouteRequest::new("/orders/5").header("tenantPath", "globex");
        assert_eq!(listener.route(&other).await, RouteDecision::Rejected { status: 404 });
    }
}
