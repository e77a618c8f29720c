//! GatewayBridge — the shared edge API in front of every tenant.
//!
//! The edge is built once per deployment. It exposes a collection and an
//! item route per backend service, proxies both through the VPC link to
//! the network load balancer, and stamps each forwarded request with the
//! `tenantPath` header taken from the authorizer context. The shared
//! listener behind the load balancer routes on that header.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenantgrid_core::config::EdgeConfig;
use tenantgrid_core::ServiceManifest;
use tenantgrid_routing::RouteRequest;
use tracing::{debug, info};

use crate::authorizer::{AuthorizerContext, DEFAULT_CACHE_TTL};
use crate::error::{GatewayError, GatewayResult};
use crate::usage_plan::UsagePlan;

pub const TENANT_PATH_HEADER: &str = "tenantPath";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const HEALTH_PATH: &str = "/health";

const COLLECTION_METHODS: &[&str] = &["GET", "POST"];
const ITEM_METHODS: &[&str] = &["GET", "PUT", "DELETE"];

/// Authorizer settings published with the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerSpec {
    pub identity_source: String,
    pub tenant_id_claim: String,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRoute {
    /// Route template, e.g. `/orders/{id}`.
    pub path: String,
    pub methods: Vec<String>,
    /// Backend service; `None` for routes the edge answers itself.
    pub service: Option<String>,
    /// Integration URI behind the VPC link.
    pub integration_uri: Option<String>,
    pub authorized: bool,
    pub admin_only: bool,
    /// Integration request header → source mapping.
    pub request_headers: BTreeMap<String, String>,
}

impl EdgeRoute {
    fn proxied(template: String, methods: &[&str], service: &str, admin_only: bool, nlb_dns: &str) -> Self {
        let request_headers = BTreeMap::from([(
            format!("integration.request.header.{TENANT_PATH_HEADER}"),
            format!("context.authorizer.{TENANT_PATH_HEADER}"),
        )]);
        Self {
            integration_uri: Some(format!("http://{nlb_dns}{template}")),
            path: template,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            service: Some(service.to_string()),
            authorized: true,
            admin_only,
            request_headers,
        }
    }

    fn health() -> Self {
        Self {
            path: HEALTH_PATH.to_string(),
            methods: vec!["GET".to_string()],
            service: None,
            integration_uri: None,
            authorized: false,
            admin_only: false,
            request_headers: BTreeMap::new(),
        }
    }

    fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// A request as it leaves the edge toward the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedRequest {
    pub method: String,
    pub uri: String,
    pub path: String,
    pub service: String,
    pub headers: BTreeMap<String, String>,
}

impl ForwardedRequest {
    /// What the shared listener sees of this request.
    pub fn route_request(&self) -> RouteRequest {
        self.headers
            .iter()
            .fold(RouteRequest::new(&self.path), |req, (k, v)| req.header(k, v))
    }
}

/// The built edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub api_url: String,
    pub vpc_link: String,
    pub nlb_dns: String,
    pub routes: Vec<EdgeRoute>,
    pub authorizer: AuthorizerSpec,
    pub usage_plans: Vec<UsagePlan>,
}

impl EdgeDescriptor {
    /// Backend services with their admin-only flag.
    pub fn services(&self) -> Vec<(&str, bool)> {
        let mut out: Vec<(&str, bool)> = Vec::new();
        for route in &self.routes {
            if let Some(svc) = route.service.as_deref() {
                if !out.iter().any(|(s, _)| *s == svc) {
                    out.push((svc, route.admin_only));
                }
            }
        }
        out
    }

    /// Match `path` against the route templates.
    pub fn find_route(&self, path: &str) -> Option<&EdgeRoute> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        self.routes.iter().find(|route| {
            let template: Vec<&str> = route.path.trim_matches('/').split('/').collect();
            template.len() == segments.len()
                && template.iter().zip(&segments).all(|(t, s)| {
                    (t.starts_with('{') && t.ends_with('}') && !s.is_empty()) || t == s
                })
        })
    }

    /// Turn an authorized request into the request sent to the load balancer.
    pub fn forward(
        &self,
        method: &str,
        path: &str,
        context: &AuthorizerContext,
    ) -> GatewayResult<ForwardedRequest> {
        let no_route = || GatewayError::NoRoute {
            method: method.to_string(),
            path: path.to_string(),
        };
        let route = self.find_route(path).ok_or_else(no_route)?;
        let service = route.service.as_deref().ok_or_else(no_route)?;
        if !route.allows(method) {
            return Err(no_route());
        }
        if !context.may_call(service) {
            return Err(GatewayError::ServiceNotAllowed {
                service: service.to_string(),
                role: context.user_role.clone(),
            });
        }

        let headers = BTreeMap::from([
            (TENANT_PATH_HEADER.to_string(), context.tenant_path.clone()),
            (API_KEY_HEADER.to_string(), context.api_key.clone()),
        ]);
        debug!(method, path, service, tenant_path = %context.tenant_path, "forwarding to load balancer");
        Ok(ForwardedRequest {
            method: method.to_ascii_uppercase(),
            uri: format!("http://{}{path}", self.nlb_dns),
            path: path.to_string(),
            service: service.to_string(),
            headers,
        })
    }
}

/// Builds the shared edge from configuration and the service manifest.
pub struct GatewayBridge {
    config: EdgeConfig,
}

impl GatewayBridge {
    pub fn new(config: &EdgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn build_edge(&self, tenant_id_claim: &str, services: &ServiceManifest) -> EdgeDescriptor {
        let nlb = &self.config.nlb_dns;
        let mut routes = vec![EdgeRoute::health()];
        for svc in &services.services {
            routes.push(EdgeRoute::proxied(
                format!("/{}", svc.name),
                COLLECTION_METHODS,
                &svc.name,
                svc.admin_only,
                nlb,
            ));
            routes.push(EdgeRoute::proxied(
                format!("/{}/{{id}}", svc.name),
                ITEM_METHODS,
                &svc.name,
                svc.admin_only,
                nlb,
            ));
        }

        let edge = EdgeDescriptor {
            api_url: self.config.api_url.clone(),
            vpc_link: self.config.vpc_link.clone(),
            nlb_dns: nlb.clone(),
            routes,
            authorizer: AuthorizerSpec {
                identity_source: "method.request.header.Authorization".to_string(),
                tenant_id_claim: tenant_id_claim.to_string(),
                cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            },
            usage_plans: UsagePlan::standard(&self.config.api_url),
        };
        info!(
            api_url = %edge.api_url,
            routes = edge.routes.len(),
            services = services.services.len(),
            "edge built"
        );
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgrid_core::{BackendServiceSpec, Tier};

    fn svc(name: &str, admin_only: bool) -> BackendServiceSpec {
        BackendServiceSpec {
            name: name.to_string(),
            image: format!("repo/{name}"),
            cpu: 256,
            memory_limit_mib: 512,
            container_port: 3010,
            storage: None,
            policy: serde_json::Value::Null,
            admin_only,
            environment: Default::default(),
        }
    }

    fn edge() -> EdgeDescriptor {
        let config = EdgeConfig {
            api_url: "https://api.example.com/prod".to_string(),
            nlb_dns: "nlb.internal".to_string(),
            vpc_link: "vpclink-1".to_string(),
            tenant_id_claim: "custom:tenantId".to_string(),
        };
        let manifest = ServiceManifest::new(vec![svc("orders", false), svc("users", true)]);
        GatewayBridge::new(&config).build_edge("custom:tenantId", &manifest)
    }

    fn context(role: &str) -> AuthorizerContext {
        AuthorizerContext {
            tenant_id: "acme".to_string(),
            tenant_path: "acme".to_string(),
            tier: Tier::Basic,
            api_key: "key".to_string(),
            user_role: role.to_string(),
            username: "alice".to_string(),
            principal_id: "sub-1".to_string(),
            allowed_services: vec!["orders".to_string()],
        }
    }

    #[test]
    fn routes_per_service_plus_health() {
        let edge = edge();
        assert_eq!(edge.routes.len(), 5);
        let item = edge.find_route("/orders/42").unwrap();
        assert_eq!(item.path, "/orders/{id}");
        assert_eq!(item.methods, vec!["GET", "PUT", "DELETE"]);
        assert_eq!(item.integration_uri.as_deref(), Some("http://nlb.internal/orders/{id}"));
        assert_eq!(
            item.request_headers.get("integration.request.header.tenantPath").map(String::as_str),
            Some("context.authorizer.tenantPath")
        );
        let health = edge.find_route("/health").unwrap();
        assert!(!health.authorized);
        assert!(edge.find_route("/orders/42/extra").is_none());
        assert_eq!(edge.services(), vec![("orders", false), ("users", true)]);
        assert_eq!(edge.authorizer.cache_ttl_secs, 30);
        assert_eq!(edge.usage_plans.len(), 4);
    }

    #[test]
    fn forward_sets_tenant_header() {
        let fwd = edge().forward("post", "/orders", &context("TenantUser")).unwrap();
        assert_eq!(fwd.method, "POST");
        assert_eq!(fwd.uri, "http://nlb.internal/orders");
        assert_eq!(fwd.headers.get("tenantPath").map(String::as_str), Some("acme"));
        assert_eq!(fwd.route_request().get_header("TENANTPATH"), Some("acme"));
    }

    #[test]
    fn forward_rejects_disallowed_service_and_method() {
        let edge = edge();
        assert!(matches!(
            edge.forward("GET", "/users", &context("TenantUser")),
            Err(GatewayError::ServiceNotAllowed { .. })
        ));
        assert!(matches!(
            edge.forward("DELETE", "/orders", &context("TenantUser")),
            Err(GatewayError::NoRoute { .. })
        ));
        assert!(matches!(
            edge.forward("GET", "/health", &context("TenantUser")),
            Err(GatewayError::NoRoute { .. })
        ));
    }
}
