//! Provisioners apply plan nodes to an infrastructure backend.
//!
//! Listener rules never reach a provisioner; they go through the routing
//! rule builder against the shared listener.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::namespace::ServiceDiscovery;
use crate::plan::{Resource, ResourceKind};

/// Account segment of in-memory ARNs.
const LOCAL_ACCOUNT: &str = "000000000000";
const LOCAL_REGION: &str = "local";

/// A resource created by a provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub arn: String,
}

/// Creates resources. Implementations must be safe to share across
/// concurrent tenant builds.
pub trait Provisioner: Send + Sync {
    fn provision(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = anyhow::Result<ProvisionedResource>> + Send;
}

/// Deterministic ARN for a resource.
pub fn arn_for(resource: &Resource) -> String {
    let name = resource.name();
    let (service, path) = match resource {
        Resource::Namespace(_) => ("servicediscovery", format!("namespace/{name}")),
        Resource::SecurityGroup(_) => ("ec2", format!("security-group/{name}")),
        Resource::Table(_) => ("dynamodb", format!("table/{name}")),
        Resource::TaskRole(_) => ("iam", format!("role/{name}")),
        Resource::TaskDefinition(_) => ("ecs", format!("task-definition/{name}:1")),
        Resource::Service(_) | Resource::ReverseProxy(_) => ("ecs", format!("service/{name}")),
        Resource::TargetGroup(_) => ("elasticloadbalancing", format!("targetgroup/{name}")),
        Resource::ListenerRule(_) => ("elasticloadbalancing", format!("listener-rule/{name}")),
        Resource::ScalingPolicy(_) => ("application-autoscaling", format!("scalable-target/{name}")),
    };
    format!("arn:aws:{service}:{LOCAL_REGION}:{LOCAL_ACCOUNT}:{path}")
}

/// Records every applied resource and registers services in an in-memory
/// service discovery registry.
///
/// A reverse proxy whose upstreams are not yet discoverable is refused.
/// Names listed in `fail_on` fail to provision.
#[derive(Default)]
pub struct InMemoryProvisioner {
    applied: Mutex<Vec<ProvisionedResource>>,
    discovery: ServiceDiscovery,
    fail_on: HashSet<String>,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make provisioning of the named resource fail.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail_on.insert(name.to_string());
        self
    }

    pub fn discovery(&self) -> &ServiceDiscovery {
        &self.discovery
    }

    /// Everything applied so far, in application order.
    pub fn applied(&self) -> Vec<ProvisionedResource> {
        self.applied.lock().expect("provisioner lock").clone()
    }

    pub fn applied_of(&self, kind: ResourceKind) -> Vec<ProvisionedResource> {
        self.applied()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

impl Provisioner for InMemoryProvisioner {
    async fn provision(&self, resource: &Resource) -> anyhow::Result<ProvisionedResource> {
        let name = resource.name();
        if self.fail_on.contains(name) {
            anyhow::bail!("{} {name}: injected failure", resource.kind());
        }

        let arn = arn_for(resource);
        match resource {
            Resource::ReverseProxy(svc) => {
                for upstream in &svc.upstreams {
                    if self.discovery.resolve(upstream).is_none() {
                        anyhow::bail!("upstream {upstream} is not discoverable");
                    }
                }
                self.discovery.register(&svc.service_connect, &arn);
            }
            Resource::Service(svc) => self.discovery.register(&svc.service_connect, &arn),
            _ => {}
        }

        let created = ProvisionedResource {
            kind: resource.kind(),
            name: name.to_string(),
            arn,
        };
        debug!(kind = %created.kind, name = %created.name, "resource provisioned");
        self.applied
            .lock()
            .expect("provisioner lock")
            .push(created.clone());
        Ok(created)
    }
}
