//! Per-tenant service discovery namespace.
//!
//! Every service of a tenant joins the tenant's namespace through
//! service-connect under `{service}-api.{namespace}.sc`. The reverse proxy
//! resolves its upstreams by these names at request time, so they must be
//! registered before the proxy starts.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Domain suffix of service-connect names.
pub const SERVICE_CONNECT_SUFFIX: &str = "sc";

/// The namespace resource itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub name: String,
}

/// Service-connect settings of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConnect {
    pub namespace: String,
    pub discovery_name: String,
    pub dns_name: String,
    pub port: u16,
}

impl ServiceConnect {
    pub fn new(service: &str, namespace: &str, port: u16) -> Self {
        Self {
            namespace: namespace.to_string(),
            discovery_name: discovery_name(service),
            dns_name: service_dns_name(service, namespace),
            port,
        }
    }
}

/// `{service}-api`
pub fn discovery_name(service: &str) -> String {
    format!("{service}-api")
}

/// `{service}-api.{namespace}.sc`
pub fn service_dns_name(service: &str, namespace: &str) -> String {
    format!("{}.{namespace}.{SERVICE_CONNECT_SUFFIX}", discovery_name(service))
}

/// A registered service-connect endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub dns_name: String,
    pub port: u16,
    /// Identifier of the service behind the name.
    pub service_arn: String,
}

/// In-memory service discovery registry, keyed by DNS name.
#[derive(Clone, Default)]
pub struct ServiceDiscovery {
    records: Arc<RwLock<BTreeMap<String, DiscoveryRecord>>>,
}

impl ServiceDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connect: &ServiceConnect, service_arn: &str) {
        let record = DiscoveryRecord {
            dns_name: connect.dns_name.clone(),
            port: connect.port,
            service_arn: service_arn.to_string(),
        };
        let mut records = self.records.write().expect("discovery lock");
        debug!(dns_name = %record.dns_name, "registered service-connect name");
        records.insert(record.dns_name.clone(), record);
    }

    pub fn resolve(&self, dns_name: &str) -> Option<DiscoveryRecord> {
        let records = self.records.read().expect("discovery lock");
        records.get(dns_name).cloned()
    }
}
