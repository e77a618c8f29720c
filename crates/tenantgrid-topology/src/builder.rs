//! ServiceTopologyBuilder — plans and builds one tenant's topology.
//!
//! `plan` turns a tenant, its tier profile and the service manifest into
//! a [`BuildPlan`]. `build` applies the plan in topological order: plain
//! resources through the [`Provisioner`], listener rules through the
//! [`RoutingRuleBuilder`] against the shared listener. The first failing
//! node aborts the build; whatever was already created stays in place.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tenantgrid_core::{ComputeSubstrate, ServiceManifest, Tenant, TierProfile};
use tenantgrid_routing::{Listener, RoutingRuleBuilder, TargetService};
use tenantgrid_state::{RoutingRule, TopologyRecord};
use tracing::{debug, info, warn};

use crate::autoscaling::ScalingPolicy;
use crate::error::{TopologyError, TopologyResult};
use crate::namespace::NamespaceSpec;
use crate::plan::{
    BuildPlan, ListenerRuleSpec, NodeId, PlanNode, Resource, ResourceKind, TargetGroupSpec,
};
use crate::provisioner::{ProvisionedResource, Provisioner};
use crate::security::SecurityGroupSpec;
use crate::storage::{TableSpec, TaskRoleSpec};
use crate::task::{ServiceSpec, TaskDefinitionSpec};

/// A service as deployed for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedService {
    pub name: String,
    pub service_name: String,
    pub substrate: ComputeSubstrate,
    pub desired_count: u32,
    pub dns_name: String,
    pub arn: String,
    /// Target group fronting the service, if it is externally reachable.
    pub target_group: Option<String>,
}

impl DeployedService {
    fn new(spec: &ServiceSpec, arn: &str) -> Self {
        Self {
            name: spec.name.clone(),
            service_name: spec.service_name.clone(),
            substrate: spec.substrate,
            desired_count: spec.desired_count,
            dns_name: spec.service_connect.dns_name.clone(),
            arn: arn.to_string(),
            target_group: None,
        }
    }
}

/// The result of a successful tenant build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTopology {
    pub tenant: Tenant,
    pub profile: TierProfile,
    pub namespace: String,
    pub listener: String,
    /// Backend services, in manifest order.
    pub services: Vec<DeployedService>,
    pub reverse_proxy: Option<DeployedService>,
    pub rules: Vec<RoutingRule>,
    pub security_group: SecurityGroupSpec,
    pub scaling: Vec<ScalingPolicy>,
    pub resources: Vec<ProvisionedResource>,
    /// Plan node keys in the order they were applied.
    pub applied_order: Vec<String>,
}

impl ServiceTopology {
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn dns_names(&self) -> Vec<&str> {
        self.services
            .iter()
            .chain(self.reverse_proxy.iter())
            .map(|s| s.dns_name.as_str())
            .collect()
    }

    /// Position of a node key in the applied order.
    pub fn applied_index(&self, key: &str) -> Option<usize> {
        self.applied_order.iter().position(|k| k == key)
    }

    pub fn to_record(&self, built_at: u64) -> TopologyRecord {
        TopologyRecord {
            tenant_id: self.tenant.tenant_id.clone(),
            tenant_name: self.tenant.tenant_name.clone(),
            tier: self.tenant.tier,
            namespace: self.namespace.clone(),
            listener: self.listener.clone(),
            services: self
                .services
                .iter()
                .chain(self.reverse_proxy.iter())
                .map(|s| s.name.clone())
                .collect(),
            rule_priorities: self.rules.iter().map(|r| r.priority).collect(),
            built_at,
        }
    }
}

/// Plan node keys.
pub mod keys {
    pub const NAMESPACE: &str = "namespace";
    pub const SECURITY_GROUP: &str = "security-group";
    pub const PROXY_TASK_DEFINITION: &str = "reverse-proxy/task-definition";
    pub const PROXY_SERVICE: &str = "reverse-proxy/service";
    pub const PROXY_TARGET_GROUP: &str = "reverse-proxy/target-group";
    pub const PROXY_LISTENER_RULE: &str = "reverse-proxy/listener-rule";

    pub fn backend(kind: &str, service: &str) -> String {
        format!("{kind}/{service}")
    }
}

pub struct ServiceTopologyBuilder<P> {
    provisioner: P,
    listener: Arc<Listener>,
    rules: RoutingRuleBuilder,
    user_pool_ref: String,
}

impl<P: Provisioner> ServiceTopologyBuilder<P> {
    pub fn new(provisioner: P, listener: Arc<Listener>) -> Self {
        Self {
            provisioner,
            listener,
            rules: RoutingRuleBuilder::default(),
            user_pool_ref: String::new(),
        }
    }

    pub fn with_rule_builder(mut self, rules: RoutingRuleBuilder) -> Self {
        self.rules = rules;
        self
    }

    /// Identity provider reference substituted into storage-less policies.
    pub fn with_user_pool_ref(mut self, user_pool_ref: &str) -> Self {
        self.user_pool_ref = user_pool_ref.to_string();
        self
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn listener(&self) -> &Arc<Listener> {
        &self.listener
    }

    /// Construct the build plan for a tenant without applying anything.
    pub fn plan(
        &self,
        tenant: &Tenant,
        profile: &TierProfile,
        manifest: &ServiceManifest,
    ) -> TopologyResult<BuildPlan> {
        manifest.validate()?;
        let namespace = tenant.tenant_name.clone();
        let manifest = manifest.with_namespace(&namespace);
        let proxy = profile
            .requires_reverse_proxy
            .then(|| manifest.reverse_proxy_or_default());

        let mut plan = BuildPlan::new();
        let ns = plan.add(
            keys::NAMESPACE,
            Resource::Namespace(NamespaceSpec {
                name: namespace.clone(),
            }),
            &[],
        )?;

        let exposed_ports: Vec<u16> = match &proxy {
            Some(p) => vec![p.container_port],
            None => manifest.services.iter().map(|s| s.container_port).collect(),
        };
        let backend_ports: Vec<u16> = manifest.services.iter().map(|s| s.container_port).collect();
        let security_group = SecurityGroupSpec::for_tenant(tenant, self.listener.name(), &exposed_ports)
            .allow_members(&backend_ports);
        let sg_name = security_group.name.clone();
        let sg = plan.add(keys::SECURITY_GROUP, Resource::SecurityGroup(security_group), &[])?;

        let mut backends: Vec<NodeId> = Vec::with_capacity(manifest.services.len());
        let mut upstreams = Vec::with_capacity(manifest.services.len());

        for svc in &manifest.services {
            let table = svc.table_binding().map(|b| TableSpec::for_binding(b, tenant));
            let table_name = table.as_ref().map(|t| t.name.clone());
            let table_node = match table {
                Some(t) => Some(plan.add(keys::backend("table", &svc.name), Resource::Table(t), &[])?),
                None => None,
            };

            let role = TaskRoleSpec::for_service(svc, tenant, &self.user_pool_ref);
            let role_name = role.name.clone();
            let role_node = plan.add(
                keys::backend("task-role", &svc.name),
                Resource::TaskRole(role),
                table_node.as_slice(),
            )?;

            let task = TaskDefinitionSpec::for_backend(svc, tenant, profile, &role_name, table_name.as_deref());
            let service = ServiceSpec::for_backend(svc, tenant, &task, &sg_name, &namespace);
            let task_node = plan.add(
                keys::backend("task-definition", &svc.name),
                Resource::TaskDefinition(task),
                &[role_node],
            )?;

            upstreams.push(service.service_connect.dns_name.clone());
            let service_node = plan.add(
                keys::backend("service", &svc.name),
                Resource::Service(service),
                &[ns, sg, task_node],
            )?;
            backends.push(service_node);

            if proxy.is_none() {
                let target = TargetService::new(&svc.name, svc.container_port);
                let tg = plan.add(
                    keys::backend("target-group", &svc.name),
                    Resource::TargetGroup(TargetGroupSpec {
                        service: svc.name.clone(),
                        target_group: self.rules.draft(tenant, &target, false).target_group,
                    }),
                    &[service_node],
                )?;
                plan.add(
                    keys::backend("listener-rule", &svc.name),
                    Resource::ListenerRule(ListenerRuleSpec {
                        service: svc.name.clone(),
                        port: svc.container_port,
                        reverse_proxy_target: false,
                    }),
                    &[tg],
                )?;
            }

            plan.add(
                keys::backend("scaling-policy", &svc.name),
                Resource::ScalingPolicy(ScalingPolicy::for_service(&svc.name, profile)),
                &[service_node],
            )?;
        }

        if let Some(proxy) = &proxy {
            let task = TaskDefinitionSpec::for_proxy(proxy, tenant, profile, &namespace);
            let service = ServiceSpec::for_proxy(proxy, tenant, &task, &sg_name, &namespace, upstreams);
            let task_node = plan.add(keys::PROXY_TASK_DEFINITION, Resource::TaskDefinition(task), &[])?;

            // The proxy resolves upstreams by DNS at request time, so every
            // backend must be registered before it starts.
            let mut deps = vec![ns, sg, task_node];
            deps.extend(&backends);
            let service_node = plan.add(keys::PROXY_SERVICE, Resource::ReverseProxy(service), &deps)?;

            let target = TargetService::new(&proxy.name, proxy.container_port);
            let tg = plan.add(
                keys::PROXY_TARGET_GROUP,
                Resource::TargetGroup(TargetGroupSpec {
                    service: proxy.name.clone(),
                    target_group: self.rules.draft(tenant, &target, true).target_group,
                }),
                &[service_node],
            )?;
            plan.add(
                keys::PROXY_LISTENER_RULE,
                Resource::ListenerRule(ListenerRuleSpec {
                    service: proxy.name.clone(),
                    port: proxy.container_port,
                    reverse_proxy_target: true,
                }),
                &[tg],
            )?;
        }

        debug!(
            tenant_id = %tenant.tenant_id,
            nodes = plan.len(),
            services = backends.len(),
            proxy = proxy.is_some(),
            "build plan constructed"
        );
        Ok(plan)
    }

    /// Plan and apply a tenant's topology.
    pub async fn build(
        &self,
        tenant: &Tenant,
        profile: &TierProfile,
        manifest: &ServiceManifest,
    ) -> TopologyResult<ServiceTopology> {
        let plan = self.plan(tenant, profile, manifest)?;
        let order = plan.topological_order()?;

        info!(
            tenant_id = %tenant.tenant_id,
            tier = %tenant.tier,
            substrate = ?profile.compute_substrate,
            nodes = order.len(),
            "building tenant topology"
        );

        let mut topology = ServiceTopology {
            tenant: tenant.clone(),
            profile: profile.clone(),
            namespace: tenant.tenant_name.clone(),
            listener: self.listener.name().to_string(),
            services: Vec::new(),
            reverse_proxy: None,
            rules: Vec::new(),
            security_group: SecurityGroupSpec {
                name: String::new(),
                ingress: Vec::new(),
            },
            scaling: Vec::new(),
            resources: Vec::new(),
            applied_order: Vec::with_capacity(order.len()),
        };
        let mut arns: HashMap<NodeId, String> = HashMap::new();

        for id in order {
            let node = plan
                .node(id)
                .ok_or_else(|| TopologyError::UnknownNode(format!("#{}", id.0)))?;

            if let Err(e) = self.apply(&plan, node, &mut arns, &mut topology).await {
                warn!(tenant_id = %tenant.tenant_id, node = %node.key, error = %e, "tenant build failed");
                return Err(e);
            }
            topology.applied_order.push(node.key.clone());
        }

        info!(
            tenant_id = %tenant.tenant_id,
            services = topology.services.len(),
            proxy = topology.reverse_proxy.is_some(),
            rules = topology.rules.len(),
            "tenant topology built"
        );
        Ok(topology)
    }

    async fn apply(
        &self,
        plan: &BuildPlan,
        node: &PlanNode,
        arns: &mut HashMap<NodeId, String>,
        topology: &mut ServiceTopology,
    ) -> TopologyResult<()> {
        match &node.resource {
            Resource::ListenerRule(spec) => {
                let target = TargetService::new(&spec.service, spec.port);
                let rule = self
                    .rules
                    .build_rule(&topology.tenant, &target, &self.listener, spec.reverse_proxy_target)
                    .await?;
                topology.rules.push(rule);
                return Ok(());
            }
            Resource::TaskRole(role) => {
                let table_arn = node
                    .depends_on
                    .iter()
                    .filter(|d| {
                        plan.node(**d)
                            .is_some_and(|n| n.resource.kind() == ResourceKind::Table)
                    })
                    .find_map(|d| arns.get(d))
                    .map(String::as_str);
                let rendered = Resource::TaskRole(role.rendered(table_arn)?);
                self.provision(node, &rendered, arns, topology).await?;
                return Ok(());
            }
            _ => {}
        }

        let created = self.provision(node, &node.resource, arns, topology).await?;
        match &node.resource {
            Resource::SecurityGroup(sg) => topology.security_group = sg.clone(),
            Resource::Service(svc) => topology.services.push(DeployedService::new(svc, &created.arn)),
            Resource::ReverseProxy(svc) => {
                topology.reverse_proxy = Some(DeployedService::new(svc, &created.arn));
            }
            Resource::TargetGroup(tg) => {
                let deployed = topology
                    .services
                    .iter_mut()
                    .chain(topology.reverse_proxy.iter_mut())
                    .find(|s| s.name == tg.service);
                if let Some(deployed) = deployed {
                    deployed.target_group = Some(tg.target_group.name.clone());
                }
            }
            Resource::ScalingPolicy(policy) => topology.scaling.push(policy.clone()),
            _ => {}
        }
        Ok(())
    }

    async fn provision(
        &self,
        node: &PlanNode,
        resource: &Resource,
        arns: &mut HashMap<NodeId, String>,
        topology: &mut ServiceTopology,
    ) -> TopologyResult<ProvisionedResource> {
        let created = self
            .provisioner
            .provision(resource)
            .await
            .map_err(|e| TopologyError::Provision {
                node: node.key.clone(),
                reason: format!("{e:#}"),
            })?;
        arns.insert(node.id, created.arn.clone());
        topology.resources.push(created.clone());
        Ok(created)
    }
}
