//! Task definitions and services.
//!
//! EC2 task definitions use `awsvpc` networking and leave sizing to the
//! container. Fargate task definitions carry task-level sizing with a
//! 512 MiB memory floor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenantgrid_core::{BackendServiceSpec, ComputeSubstrate, ReverseProxySpec, Tenant, TierProfile};

use crate::namespace::ServiceConnect;

/// Baseline memory of a Fargate task.
pub const FARGATE_TASK_MEMORY_MIB: u32 = 512;

pub const BACKEND_DESIRED_COUNT: u32 = 2;
pub const PROXY_DESIRED_COUNT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    AwsVpc,
}

/// The single container of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub container_port: u16,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub substrate: ComputeSubstrate,
    pub network_mode: Option<NetworkMode>,
    /// Task-level sizing, Fargate only.
    pub task_cpu: Option<u32>,
    pub task_memory_mib: Option<u32>,
    /// Name of the task role, if the task has one.
    pub task_role: Option<String>,
    pub container: ContainerSpec,
}

impl TaskDefinitionSpec {
    fn sized(
        family: String,
        profile: &TierProfile,
        task_role: Option<String>,
        container: ContainerSpec,
    ) -> Self {
        let (network_mode, task_cpu, task_memory_mib) = match profile.compute_substrate {
            ComputeSubstrate::Ec2 => (Some(NetworkMode::AwsVpc), None, None),
            ComputeSubstrate::Fargate => (
                None,
                Some(container.cpu),
                Some(container.memory_limit_mib.max(FARGATE_TASK_MEMORY_MIB)),
            ),
        };
        Self {
            family,
            substrate: profile.compute_substrate,
            network_mode,
            task_cpu,
            task_memory_mib,
            task_role,
            container,
        }
    }

    /// Task definition of a backend service.
    ///
    /// `table` is the tenant table name, exposed to the container under the
    /// binding's table-name key.
    pub fn for_backend(
        spec: &BackendServiceSpec,
        tenant: &Tenant,
        profile: &TierProfile,
        task_role: &str,
        table: Option<&str>,
    ) -> Self {
        let mut environment = spec.environment.clone();
        if let (Some(binding), Some(table)) = (spec.table_binding(), table) {
            environment.insert(binding.table_name.clone(), table.to_string());
        }
        environment.insert("TENANT_ID".to_string(), tenant.tenant_id.clone());

        let container = ContainerSpec {
            name: format!("{}-container", spec.name),
            image: spec.image.clone(),
            cpu: spec.cpu,
            memory_limit_mib: spec.memory_limit_mib,
            container_port: spec.container_port,
            environment,
        };
        Self::sized(
            format!("{}-TaskDef-{}", spec.name, tenant.alphanumeric_name()),
            profile,
            Some(task_role.to_string()),
            container,
        )
    }

    /// Task definition of the reverse proxy.
    ///
    /// The proxy learns its namespace from the environment and resolves
    /// upstreams as `{service}-api.{NAMESPACE}.sc`.
    pub fn for_proxy(
        spec: &ReverseProxySpec,
        tenant: &Tenant,
        profile: &TierProfile,
        namespace: &str,
    ) -> Self {
        let environment = BTreeMap::from([
            ("TENANT_ID".to_string(), tenant.tenant_id.clone()),
            ("NAMESPACE".to_string(), namespace.to_string()),
        ]);
        let container = ContainerSpec {
            name: format!("{}-nginx", spec.name),
            image: spec.image.clone(),
            cpu: spec.cpu,
            memory_limit_mib: spec.memory_limit_mib,
            container_port: spec.container_port,
            environment,
        };
        Self::sized(
            format!("{}-TaskDef-{}", spec.name, tenant.alphanumeric_name()),
            profile,
            None,
            container,
        )
    }
}

/// A long-running service of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Manifest name (`orders`).
    pub name: String,
    /// Physical name: manifest name plus the alphanumeric tenant name.
    pub service_name: String,
    pub substrate: ComputeSubstrate,
    pub desired_count: u32,
    pub task_family: String,
    pub security_group: String,
    pub service_connect: ServiceConnect,
    pub reverse_proxy: bool,
    /// DNS names the service must be able to resolve at start. Only the
    /// proxy has upstreams.
    pub upstreams: Vec<String>,
}

impl ServiceSpec {
    pub fn for_backend(
        spec: &BackendServiceSpec,
        tenant: &Tenant,
        task: &TaskDefinitionSpec,
        security_group: &str,
        namespace: &str,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            service_name: format!("{}{}", spec.name, tenant.alphanumeric_name()),
            substrate: task.substrate,
            desired_count: BACKEND_DESIRED_COUNT,
            task_family: task.family.clone(),
            security_group: security_group.to_string(),
            service_connect: ServiceConnect::new(&spec.name, namespace, spec.container_port),
            reverse_proxy: false,
            upstreams: Vec::new(),
        }
    }

    pub fn for_proxy(
        spec: &ReverseProxySpec,
        tenant: &Tenant,
        task: &TaskDefinitionSpec,
        security_group: &str,
        namespace: &str,
        upstreams: Vec<String>,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            service_name: format!("{}{}", spec.name, tenant.alphanumeric_name()),
            substrate: task.substrate,
            desired_count: PROXY_DESIRED_COUNT,
            task_family: task.family.clone(),
            security_group: security_group.to_string(),
            service_connect: ServiceConnect::new(&spec.name, namespace, spec.container_port),
            reverse_proxy: true,
            upstreams,
        }
    }
}
