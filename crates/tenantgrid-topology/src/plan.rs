//! The build plan: a DAG of resource specs.
//!
//! Nodes are resources to create; an edge `a → b` means `a` must exist
//! before `b`. The plan is pure data, so the order a topology will be
//! built in can be inspected and tested without provisioning anything.
//!
//! ```text
//! Namespace ─┐
//! SecurityGroup ─┬─► Service ─► TargetGroup ─► ListenerRule      (pooled)
//! Table ─► TaskRole ─► TaskDefinition ─┘   └─► ScalingPolicy
//!
//! Service(each backend) ─► ReverseProxy ─► TargetGroup ─► ListenerRule   (siloed)
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tenantgrid_state::TargetGroupRef;

use crate::autoscaling::ScalingPolicy;
use crate::error::{TopologyError, TopologyResult};
use crate::namespace::NamespaceSpec;
use crate::security::SecurityGroupSpec;
use crate::storage::{TableSpec, TaskRoleSpec};
use crate::task::{ServiceSpec, TaskDefinitionSpec};

/// Index of a node within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    SecurityGroup,
    Table,
    TaskRole,
    TaskDefinition,
    Service,
    ReverseProxy,
    TargetGroup,
    ListenerRule,
    ScalingPolicy,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::Table => "table",
            ResourceKind::TaskRole => "task-role",
            ResourceKind::TaskDefinition => "task-definition",
            ResourceKind::Service => "service",
            ResourceKind::ReverseProxy => "reverse-proxy",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::ListenerRule => "listener-rule",
            ResourceKind::ScalingPolicy => "scaling-policy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target group, attached to the service it fronts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupSpec {
    pub service: String,
    pub target_group: TargetGroupRef,
}

/// A rule to register on the shared listener. The priority is assigned
/// when the node is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerRuleSpec {
    pub service: String,
    pub port: u16,
    pub reverse_proxy_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Namespace(NamespaceSpec),
    SecurityGroup(SecurityGroupSpec),
    Table(TableSpec),
    TaskRole(TaskRoleSpec),
    TaskDefinition(TaskDefinitionSpec),
    Service(ServiceSpec),
    ReverseProxy(ServiceSpec),
    TargetGroup(TargetGroupSpec),
    ListenerRule(ListenerRuleSpec),
    ScalingPolicy(ScalingPolicy),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Namespace(_) => ResourceKind::Namespace,
            Resource::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Resource::Table(_) => ResourceKind::Table,
            Resource::TaskRole(_) => ResourceKind::TaskRole,
            Resource::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Resource::Service(_) => ResourceKind::Service,
            Resource::ReverseProxy(_) => ResourceKind::ReverseProxy,
            Resource::TargetGroup(_) => ResourceKind::TargetGroup,
            Resource::ListenerRule(_) => ResourceKind::ListenerRule,
            Resource::ScalingPolicy(_) => ResourceKind::ScalingPolicy,
        }
    }

    /// Physical name of the resource.
    pub fn name(&self) -> &str {
        match self {
            Resource::Namespace(n) => &n.name,
            Resource::SecurityGroup(sg) => &sg.name,
            Resource::Table(t) => &t.name,
            Resource::TaskRole(r) => &r.name,
            Resource::TaskDefinition(t) => &t.family,
            Resource::Service(s) | Resource::ReverseProxy(s) => &s.service_name,
            Resource::TargetGroup(tg) => &tg.target_group.name,
            Resource::ListenerRule(r) => &r.service,
            Resource::ScalingPolicy(p) => &p.service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: NodeId,
    /// Unique within the plan, e.g. `service/orders`.
    pub key: String,
    pub resource: Resource,
    /// Nodes that must exist first.
    pub depends_on: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    nodes: Vec<PlanNode>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Keys are unique; dependencies must already be in the plan.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        resource: Resource,
        depends_on: &[NodeId],
    ) -> TopologyResult<NodeId> {
        let key = key.into();
        if self.find(&key).is_some() {
            return Err(TopologyError::DuplicateNode(key));
        }
        for dep in depends_on {
            if dep.0 >= self.nodes.len() {
                return Err(TopologyError::UnknownNode(format!("#{} (dependency of {key})", dep.0)));
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(PlanNode {
            id,
            key,
            resource,
            depends_on: depends_on.to_vec(),
        });
        Ok(id)
    }

    /// Add a "must exist before" edge between two existing nodes.
    pub fn add_edge(&mut self, before: NodeId, after: NodeId) -> TopologyResult<()> {
        if before.0 >= self.nodes.len() {
            return Err(TopologyError::UnknownNode(format!("#{}", before.0)));
        }
        let node = self
            .nodes
            .get_mut(after.0)
            .ok_or_else(|| TopologyError::UnknownNode(format!("#{}", after.0)))?;
        if !node.depends_on.contains(&before) {
            node.depends_on.push(before);
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, key: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.nodes.iter().filter(|n| n.resource.kind() == kind).count()
    }

    /// Kahn's algorithm. Among ready nodes the earliest added goes first.
    pub fn topological_order(&self) -> TopologyResult<Vec<NodeId>> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.depends_on.len()).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &self.nodes {
            for dep in &node.depends_on {
                dependents.entry(*dep).or_default().push(node.id);
            }
        }

        let mut ready: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.depends_on.is_empty())
            .map(|n| n.id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for next in dependents.get(&id).into_iter().flatten() {
                indegree[next.0] -= 1;
                if indegree[next.0] == 0 {
                    ready.insert(*next);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining = self
                .nodes
                .iter()
                .filter(|n| indegree[n.id.0] > 0)
                .map(|n| n.key.clone())
                .collect();
            return Err(TopologyError::Cycle { remaining });
        }
        Ok(order)
    }

    /// Whether `before` is a transitive dependency of `after`.
    pub fn precedes(&self, before: NodeId, after: NodeId) -> bool {
        let mut stack = vec![after];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            for dep in &node.depends_on {
                if *dep == before {
                    return true;
                }
                if seen.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> Resource {
        Resource::Namespace(NamespaceSpec {
            name: name.to_string(),
        })
    }

    #[test]
    fn order_respects_edges_and_insertion() {
        let mut plan = BuildPlan::new();
        let a = plan.add("a", ns("a"), &[]).unwrap();
        let b = plan.add("b", ns("b"), &[]).unwrap();
        let c = plan.add("c", ns("c"), &[b]).unwrap();
        let d = plan.add("d", ns("d"), &[a, c]).unwrap();

        assert_eq!(plan.topological_order().unwrap(), vec![a, b, c, d]);
        assert!(plan.precedes(b, d));
        assert!(!plan.precedes(d, b));
    }

    #[test]
    fn late_edge_reorders() {
        let mut plan = BuildPlan::new();
        let a = plan.add("a", ns("a"), &[]).unwrap();
        let b = plan.add("b", ns("b"), &[]).unwrap();
        plan.add_edge(b, a).unwrap();
        assert_eq!(plan.topological_order().unwrap(), vec![b, a]);
    }

    #[test]
    fn cycle_is_reported() {
        let mut plan = BuildPlan::new();
        let root = plan.add("root", ns("root"), &[]).unwrap();
        let a = plan.add("a", ns("a"), &[root]).unwrap();
        let b = plan.add("b", ns("b"), &[a]).unwrap();
        plan.add_edge(b, a).unwrap();

        match plan.topological_order() {
            Err(TopologyError::Cycle { remaining }) => assert_eq!(remaining, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut plan = BuildPlan::new();
        assert!(matches!(
            plan.add("a", ns("a"), &[NodeId(3)]),
            Err(TopologyError::UnknownNode(_))
        ));
        assert!(plan.is_empty());
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut plan = BuildPlan::new();
        plan.add("service/orders", ns("a"), &[]).unwrap();
        assert!(matches!(
            plan.add("service/orders", ns("b"), &[]),
            Err(TopologyError::DuplicateNode(ref key)) if key == "service/orders"
        ));
        assert_eq!(plan.len(), 1);
    }
}
