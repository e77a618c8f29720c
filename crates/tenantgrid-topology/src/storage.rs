//! Per-tenant tables and task role policies.

use serde::{Deserialize, Serialize};
use tenantgrid_core::{BackendServiceSpec, StorageBinding, Tenant};

use crate::error::{TopologyError, TopologyResult};

/// Partition key of every tenant table.
pub const PARTITION_KEY: &str = "tenantId";

pub const TABLE_ARN_PLACEHOLDER: &str = "<TABLE_ARN>";
pub const USER_POOL_PLACEHOLDER: &str = "<USER_POOL_ID>";

/// Managed policy every backend task role carries.
pub const TASK_ROLE_MANAGED_POLICY: &str = "service-role/AmazonEC2ContainerServiceforEC2Role";

/// A per-service, per-tenant table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl TableSpec {
    pub fn for_binding(binding: &StorageBinding, tenant: &Tenant) -> Self {
        Self {
            name: table_name(&binding.table_name, &tenant.tenant_name),
            partition_key: PARTITION_KEY.to_string(),
            sort_key: binding.sort_key.clone(),
        }
    }
}

/// `{table_name lowercased, '_' → '-'}-{tenant_name}`
pub fn table_name(table_name: &str, tenant_name: &str) -> String {
    format!("{}-{tenant_name}", table_name.replace('_', "-").to_lowercase())
}

/// What the policy template is bound to once the role is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyBinding {
    /// `<TABLE_ARN>` takes the ARN of the service's table.
    Table { table: String },
    /// `<USER_POOL_ID>` takes the identity provider reference.
    UserPool { user_pool_ref: String },
}

/// Task role of one backend service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRoleSpec {
    pub name: String,
    pub service: String,
    pub binding: PolicyBinding,
    /// Inline policy. Holds the template until rendered.
    pub policy: serde_json::Value,
    pub managed_policies: Vec<String>,
}

impl TaskRoleSpec {
    pub fn for_service(spec: &BackendServiceSpec, tenant: &Tenant, user_pool_ref: &str) -> Self {
        let binding = match spec.table_binding() {
            Some(b) => PolicyBinding::Table {
                table: table_name(&b.table_name, &tenant.tenant_name),
            },
            None => PolicyBinding::UserPool {
                user_pool_ref: user_pool_ref.to_string(),
            },
        };
        Self {
            name: format!("{}-ecsTaskRole-{}", spec.name, tenant.alphanumeric_name()),
            service: spec.name.clone(),
            binding,
            policy: spec.policy.clone(),
            managed_policies: vec![TASK_ROLE_MANAGED_POLICY.to_string()],
        }
    }

    /// The role with its policy template filled in.
    ///
    /// `table_arn` is required for table-bound roles.
    pub fn rendered(&self, table_arn: Option<&str>) -> TopologyResult<Self> {
        let (placeholder, value) = match (&self.binding, table_arn) {
            (PolicyBinding::Table { .. }, Some(arn)) => (TABLE_ARN_PLACEHOLDER, arn),
            (PolicyBinding::Table { table }, None) => {
                return Err(TopologyError::Policy {
                    service: self.service.clone(),
                    reason: format!("table {table} has no ARN yet"),
                });
            }
            (PolicyBinding::UserPool { user_pool_ref }, _) => {
                (USER_POOL_PLACEHOLDER, user_pool_ref.as_str())
            }
        };
        let mut out = self.clone();
        out.policy = substitute(&self.policy, placeholder, value).map_err(|e| {
            TopologyError::Policy {
                service: self.service.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(out)
    }
}

/// Replace every occurrence of `placeholder` in the policy's JSON text.
pub fn substitute(
    template: &serde_json::Value,
    placeholder: &str,
    value: &str,
) -> serde_json::Result<serde_json::Value> {
    let text = serde_json::to_string(template)?;
    // The value lands inside JSON strings.
    let escaped = serde_json::to_string(value)?;
    let escaped = &escaped[1..escaped.len() - 1];
    serde_json::from_str(&text.replace(placeholder, escaped))
}
