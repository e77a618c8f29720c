//! Declarative service manifest.
//!
//! The manifest is a JSON document shared by every tenant:
//!
//! ```json
//! {
//!   "Containers": [
//!     { "name": "orders", "image": "repo/orders", "cpu": 256,
//!       "memoryLimitMiB": 512, "containerPort": 3010,
//!       "database": { "kind": "dynamodb", "tableName": "ORDER_TABLE", "sortKey": "orderId" },
//!       "policy": { "Statement": [ { "Resource": "<TABLE_ARN>" } ] } }
//!   ],
//!   "Rproxy": { "name": "rproxy", "image": "repo/rproxy", "cpu": 208,
//!               "memoryLimitMiB": 320, "containerPort": 80 }
//! }
//! ```
//!
//! Only presence of the required fields is checked, plus name uniqueness.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Placeholder substituted with the tenant's namespace name.
pub const NAMESPACE_PLACEHOLDER: &str = "<NAMESPACE>";

/// Storage kind that yields a per-tenant table.
const TABLE_STORAGE_KIND: &str = "dynamodb";

/// One backend service; yields one deployed service per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendServiceSpec {
    pub name: String,
    pub image: String,
    pub cpu: u32,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: u32,
    pub container_port: u16,
    /// Per-service table binding.
    #[serde(default, rename = "database", skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBinding>,
    /// IAM policy template (`<TABLE_ARN>` / `<USER_POOL_ID>` placeholders).
    #[serde(default)]
    pub policy: serde_json::Value,
    /// Callable only by tenant admins at the edge.
    #[serde(default)]
    pub admin_only: bool,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl BackendServiceSpec {
    /// The table binding, if it is a kind that produces a per-tenant table.
    pub fn table_binding(&self) -> Option<&StorageBinding> {
        self.storage
            .as_ref()
            .filter(|s| s.kind.eq_ignore_ascii_case(TABLE_STORAGE_KIND))
    }
}

/// Table binding: one table per service, partitioned by tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBinding {
    #[serde(default = "default_storage_kind")]
    pub kind: String,
    pub table_name: String,
    #[serde(default)]
    pub sort_key: Option<String>,
}

fn default_storage_kind() -> String {
    TABLE_STORAGE_KIND.to_string()
}

/// The per-tenant reverse proxy container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseProxySpec {
    pub name: String,
    pub image: String,
    pub cpu: u32,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: u32,
    pub container_port: u16,
}

impl Default for ReverseProxySpec {
    fn default() -> Self {
        Self {
            name: "rproxy".to_string(),
            image: "rproxy".to_string(),
            cpu: 208,
            memory_limit_mib: 320,
            container_port: 80,
        }
    }
}

/// The full manifest: backend services plus an optional proxy spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    #[serde(rename = "Containers")]
    pub services: Vec<BackendServiceSpec>,
    #[serde(rename = "Rproxy", default, skip_serializing_if = "Option::is_none")]
    pub reverse_proxy: Option<ReverseProxySpec>,
}

impl ServiceManifest {
    pub fn new(services: Vec<BackendServiceSpec>) -> Self {
        Self {
            services,
            reverse_proxy: None,
        }
    }

    /// Parse and validate a manifest from JSON text.
    pub fn parse(json: &str) -> CoreResult<Self> {
        let manifest: ServiceManifest =
            serde_json::from_str(json).map_err(|e| CoreError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Required fields present, ports non-zero, names unique.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for svc in &self.services {
            if svc.name.trim().is_empty() {
                return Err(CoreError::Manifest("service name must not be empty".into()));
            }
            if svc.image.trim().is_empty() {
                return Err(CoreError::Manifest(format!("service {}: image is empty", svc.name)));
            }
            if svc.container_port == 0 {
                return Err(CoreError::Manifest(format!(
                    "service {}: containerPort must be non-zero",
                    svc.name
                )));
            }
            if !seen.insert(svc.name.as_str()) {
                return Err(CoreError::Manifest(format!("duplicate service name: {}", svc.name)));
            }
        }
        Ok(())
    }

    /// The proxy spec, or the default one when the manifest has none.
    pub fn reverse_proxy_or_default(&self) -> ReverseProxySpec {
        self.reverse_proxy.clone().unwrap_or_default()
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Copy of the manifest with `<NAMESPACE>` replaced in environment values.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        let mut out = self.clone();
        for svc in &mut out.services {
            for value in svc.environment.values_mut() {
                if value.contains(NAMESPACE_PLACEHOLDER) {
                    *value = value.replace(NAMESPACE_PLACEHOLDER, namespace);
                }
            }
        }
        out
    }
}
