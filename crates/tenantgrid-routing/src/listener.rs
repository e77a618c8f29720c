//! The shared load balancer listener.
//!
//! One listener carries the rules of every tenant. Rules are keyed by
//! priority; registration is a compare-and-swap on that key, so two rules
//! can never hold the same priority. Allocation and registration run
//! under a single async mutex held only for that step, which serialises
//! concurrent tenant builds on the listener without blocking the rest of
//! their work.
//!
//! Dispatch evaluates rules in ascending priority. The first rule whose
//! conditions all match forwards the request; otherwise the default
//! action rejects it with a fixed 404.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tenantgrid_state::{MatchConditions, RoutingRule, StateStore, TargetGroupRef};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::allocator::{Occupied, RuleAllocator, RuleKey, PRIORITY_SPACE};
use crate::error::{RoutingError, RoutingResult};
use crate::matcher::{compile_path_pattern, header_matches};

/// Status returned by the listener's default action.
pub const DEFAULT_ACTION_STATUS: u16 = 404;

/// A rule waiting for a priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub tenant_id: String,
    pub service_name: String,
    pub conditions: MatchConditions,
    pub target_group: TargetGroupRef,
}

impl RuleDraft {
    fn key(&self) -> RuleKey {
        RuleKey {
            tenant_id: self.tenant_id.clone(),
            service_name: self.service_name.clone(),
        }
    }

    fn with_priority(&self, listener: &str, priority: u32) -> RoutingRule {
        RoutingRule {
            listener: listener.to_string(),
            tenant_id: self.tenant_id.clone(),
            service_name: self.service_name.clone(),
            priority,
            conditions: self.conditions.clone(),
            target_group: self.target_group.clone(),
        }
    }
}

/// The parts of an HTTP request the listener looks at.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub path: String,
    /// Header names are stored lowercased.
    headers: BTreeMap<String, String>,
}

impl RouteRequest {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Outcome of dispatching a request through the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteDecision {
    Forward {
        priority: u32,
        tenant_id: String,
        service_name: String,
        target_group: TargetGroupRef,
    },
    /// No rule matched; the default action answered.
    Rejected { status: u16 },
}

struct ListenerState {
    rules: BTreeMap<u32, RoutingRule>,
    patterns: HashMap<u32, Regex>,
    allocator: Box<dyn RuleAllocator>,
}

impl ListenerState {
    fn insert(
        &mut self,
        listener: &str,
        store: Option<&StateStore>,
        rule: RoutingRule,
    ) -> RoutingResult<()> {
        if rule.priority == 0 || rule.priority >= PRIORITY_SPACE {
            return Err(RoutingError::InvalidPriority(rule.priority));
        }
        if self.rules.contains_key(&rule.priority) {
            return Err(RoutingError::PriorityCollision {
                listener: listener.to_string(),
                priority: rule.priority,
            });
        }
        if let Some(store) = store {
            store.put_rule(&rule)?;
        }
        if let Some(pattern) = &rule.conditions.path_pattern {
            self.patterns
                .insert(rule.priority, compile_path_pattern(pattern));
        }
        self.rules.insert(rule.priority, rule);
        Ok(())
    }

    fn matches(&self, rule: &RoutingRule, req: &RouteRequest) -> bool {
        if !header_matches(
            &rule.conditions.header_value,
            req.get_header(&rule.conditions.header_name),
        ) {
            return false;
        }
        match self.patterns.get(&rule.priority) {
            Some(re) => re.is_match(&req.path),
            None => true,
        }
    }
}

/// The shared listener every tenant attaches rules to.
pub struct Listener {
    name: String,
    state: Mutex<ListenerState>,
    store: Option<StateStore>,
}

impl Listener {
    /// An empty, in-memory listener.
    pub fn new(name: &str, allocator: Box<dyn RuleAllocator>) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(ListenerState {
                rules: BTreeMap::new(),
                patterns: HashMap::new(),
                allocator,
            }),
            store: None,
        }
    }

    /// A listener backed by the state store, restored from its saved rules.
    ///
    /// Every later registration and removal is written through.
    pub fn load(
        name: &str,
        allocator: Box<dyn RuleAllocator>,
        store: StateStore,
    ) -> RoutingResult<Self> {
        let mut state = ListenerState {
            rules: BTreeMap::new(),
            patterns: HashMap::new(),
            allocator,
        };
        for rule in store.list_rules(name)? {
            state.insert(name, None, rule)?;
        }
        info!(listener = name, rules = state.rules.len(), "listener restored");
        Ok(Self {
            name: name.to_string(),
            state: Mutex::new(state),
            store: Some(store),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a rule with a caller-chosen priority.
    pub async fn register(&self, rule: RoutingRule) -> RoutingResult<()> {
        let mut state = self.state.lock().await;
        state.insert(&self.name, self.store.as_ref(), rule)
    }

    /// Allocate a priority and register the rule in one critical section.
    ///
    /// A colliding or invalid proposal is re-drawn, up to `max_attempts`
    /// proposals in total.
    pub async fn allocate_and_register(
        &self,
        draft: &RuleDraft,
        max_attempts: u32,
    ) -> RoutingResult<RoutingRule> {
        let key = draft.key();
        let mut state = self.state.lock().await;
        let mut tried = Vec::new();

        for attempt in 1..=max_attempts.max(1) {
            let proposal = {
                let ListenerState {
                    rules, allocator, ..
                } = &mut *state;
                allocator.next_priority(&key, Occupied(rules))
            };
            let Some(priority) = proposal else {
                break;
            };
            tried.push(priority);

            let rule = draft.with_priority(&self.name, priority);
            match state.insert(&self.name, self.store.as_ref(), rule.clone()) {
                Ok(()) => {
                    debug!(
                        listener = %self.name,
                        tenant_id = %draft.tenant_id,
                        service = %draft.service_name,
                        priority,
                        attempt,
                        "listener rule registered"
                    );
                    return Ok(rule);
                }
                Err(e @ (RoutingError::PriorityCollision { .. } | RoutingError::InvalidPriority(_))) => {
                    warn!(
                        listener = %self.name,
                        tenant_id = %draft.tenant_id,
                        service = %draft.service_name,
                        attempt,
                        error = %e,
                        "priority rejected, drawing again"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(RoutingError::PriorityExhausted {
            listener: self.name.clone(),
            tenant_id: draft.tenant_id.clone(),
            service: draft.service_name.clone(),
            tried,
        })
    }

    /// Remove every rule belonging to a tenant. Returns the removed rules.
    pub async fn remove_tenant(&self, tenant_id: &str) -> RoutingResult<Vec<RoutingRule>> {
        let mut state = self.state.lock().await;
        if let Some(store) = &self.store {
            store.delete_rules_for_tenant(&self.name, tenant_id)?;
        }
        let priorities: Vec<u32> = state
            .rules
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.priority)
            .collect();
        let mut removed = Vec::with_capacity(priorities.len());
        for p in priorities {
            state.patterns.remove(&p);
            if let Some(rule) = state.rules.remove(&p) {
                removed.push(rule);
            }
        }
        info!(listener = %self.name, tenant_id, count = removed.len(), "tenant rules removed");
        Ok(removed)
    }

    /// All rules, in priority order.
    pub async fn snapshot(&self) -> Vec<RoutingRule> {
        let state = self.state.lock().await;
        state.rules.values().cloned().collect()
    }

    /// Replace the in-memory rule set with a saved snapshot.
    ///
    /// Rules for other listeners are skipped. Nothing is written to the
    /// store; the snapshot is assumed to come from it.
    pub async fn restore(&self, rules: Vec<RoutingRule>) -> RoutingResult<usize> {
        let mut state = self.state.lock().await;
        state.rules.clear();
        state.patterns.clear();
        for rule in rules.into_iter().filter(|r| r.listener == self.name) {
            state.insert(&self.name, None, rule)?;
        }
        Ok(state.rules.len())
    }

    /// Dispatch a request: first matching rule by ascending priority wins.
    pub async fn route(&self, req: &RouteRequest) -> RouteDecision {
        let state = self.state.lock().await;
        for rule in state.rules.values() {
            if state.matches(rule, req) {
                return RouteDecision::Forward {
                    priority: rule.priority,
                    tenant_id: rule.tenant_id.clone(),
                    service_name: rule.service_name.clone(),
                    target_group: rule.target_group.clone(),
                };
            }
        }
        RouteDecision::Rejected {
            status: DEFAULT_ACTION_STATUS,
        }
    }
}
