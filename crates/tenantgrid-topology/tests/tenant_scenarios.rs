//! End-to-end tenant build scenarios.
//!
//! Builds pooled and siloed tenants against one shared listener with the
//! in-memory provisioner, then checks the resulting services, rules and
//! request dispatch.

use std::collections::HashSet;
use std::sync::Arc;

use tenantgrid_core::{
    BackendServiceSpec, ComputeSubstrate, ServiceManifest, Tenant, Tier, TierPolicy, TierProfile,
};
use tenantgrid_routing::{
    Listener, RandomDraw, RouteDecision, RouteRequest, RoutingError, RoutingRuleBuilder,
    ScriptedAllocator, Sequential,
};
use tenantgrid_state::StateStore;
use tenantgrid_topology::builder::keys;
use tenantgrid_topology::*;

fn backend(name: &str, port: u16) -> BackendServiceSpec {
    BackendServiceSpec {
        name: name.to_string(),
        image: format!("repo/{name}"),
        cpu: 256,
        memory_limit_mib: 512,
        container_port: port,
        storage: None,
        policy: serde_json::json!({ "Statement": [ { "Resource": "<USER_POOL_ID>" } ] }),
        admin_only: false,
        environment: Default::default(),
    }
}

fn orders_and_products() -> ServiceManifest {
    ServiceManifest::new(vec![backend("orders", 3010), backend("products", 3020)])
}

fn shared_listener() -> Arc<Listener> {
    Arc::new(Listener::new("shared-alb-listener", Box::new(Sequential)))
}

fn builder(listener: Arc<Listener>) -> ServiceTopologyBuilder<InMemoryProvisioner> {
    ServiceTopologyBuilder::new(InMemoryProvisioner::new(), listener).with_user_pool_ref("pool-1")
}

#[tokio::test]
async fn basic_tenant_gets_pooled_fargate_services() {
    let b = builder(shared_listener());
    let tenant = Tenant::new("acme", "acme", Tier::Basic);
    let profile = TierPolicy::resolve("basic");

    let topology = b.build(&tenant, &profile, &orders_and_products()).await.unwrap();

    assert_eq!(topology.services.len(), 2);
    assert!(topology
        .services
        .iter()
        .all(|s| s.substrate == ComputeSubstrate::Fargate && s.desired_count == 2));
    assert!(topology.reverse_proxy.is_none());
    assert!(b.provisioner().applied_of(ResourceKind::ReverseProxy).is_empty());

    assert_eq!(topology.rules.len(), 2);
    let patterns: HashSet<_> = topology
        .rules
        .iter()
        .map(|r| r.conditions.path_pattern.clone().unwrap())
        .collect();
    assert_eq!(patterns, HashSet::from(["/orders*".to_string(), "/products*".to_string()]));
    for rule in &topology.rules {
        assert_eq!(rule.conditions.header_name, "tenantPath");
        assert_eq!(rule.conditions.header_value, "acme");
        assert_eq!(rule.target_group.name, format!("tg-{}-acme", rule.service_name));
    }
}

#[tokio::test]
async fn premium_tenant_gets_one_proxy_rule() {
    let b = builder(shared_listener());
    let tenant = Tenant::new("acme2", "acme2", Tier::Premium);
    let profile = TierPolicy::resolve("PREMIUM");

    let topology = b.build(&tenant, &profile, &orders_and_products()).await.unwrap();

    assert_eq!(topology.services.len(), 2);
    assert!(topology
        .services
        .iter()
        .all(|s| s.substrate == ComputeSubstrate::Ec2 && s.target_group.is_none()));

    let proxy = topology.reverse_proxy.as_ref().unwrap();
    assert_eq!(proxy.desired_count, 1);
    assert_eq!(proxy.target_group.as_deref(), Some("tg-rproxy-acme2"));
    assert_eq!(b.provisioner().applied_of(ResourceKind::ReverseProxy).len(), 1);

    assert_eq!(topology.rules.len(), 1);
    let rule = &topology.rules[0];
    assert_eq!(rule.conditions.header_value, "acme2");
    assert!(rule.conditions.path_pattern.is_none());
    assert_eq!(rule.service_name, "rproxy");
}

#[tokio::test]
async fn proxy_is_applied_after_every_backend() {
    let b = builder(shared_listener());
    let tenant = Tenant::new("acme2", "acme2", Tier::Platinum);
    let topology = b
        .build(&tenant, &TierProfile::for_tier(Tier::Platinum), &orders_and_products())
        .await
        .unwrap();

    let proxy_at = topology.applied_index(keys::PROXY_SERVICE).unwrap();
    for svc in ["service/orders", "service/products"] {
        assert!(topology.applied_index(svc).unwrap() < proxy_at);
    }
    // Upstreams were discoverable when the proxy started.
    assert!(b.provisioner().discovery().resolve("orders-api.acme2.sc").is_some());
    assert!(b.provisioner().discovery().resolve("rproxy-api.acme2.sc").is_some());
}

#[tokio::test]
async fn pooled_rules_are_distinct_for_any_service_count() {
    for n in 1..=6u16 {
        let b = builder(shared_listener());
        let services = (0..n).map(|i| backend(&format!("svc{i}"), 3000 + i)).collect();
        let tenant = Tenant::new("t", "t", Tier::Basic);
        let topology = b
            .build(&tenant, &TierProfile::for_tier(Tier::Basic), &ServiceManifest::new(services))
            .await
            .unwrap();

        assert_eq!(topology.rules.len(), usize::from(n));
        let pairs: HashSet<_> = topology
            .rules
            .iter()
            .map(|r| (r.service_name.clone(), r.conditions.path_pattern.clone()))
            .collect();
        assert_eq!(pairs.len(), usize::from(n));
        assert!(topology.rules.iter().all(|r| !r.targets_proxy()));
    }
}

#[tokio::test]
async fn unknown_tier_builds_pooled() {
    let b = builder(shared_listener());
    let profile = TierPolicy::resolve("gold");
    let tenant = Tenant::new("g", "g", profile.tier);
    let topology = b.build(&tenant, &profile, &orders_and_products()).await.unwrap();
    assert!(topology.reverse_proxy.is_none());
    assert_eq!(topology.rules.len(), 2);
}

#[tokio::test]
async fn forced_priority_collision_fails_the_build() {
    let listener = Arc::new(Listener::new("alb", Box::new(ScriptedAllocator::new([42]))));
    let b = builder(listener.clone()).with_rule_builder(RoutingRuleBuilder::new(3));
    let tenant = Tenant::new("acme", "acme", Tier::Basic);

    let err = b
        .build(&tenant, &TierProfile::for_tier(Tier::Basic), &orders_and_products())
        .await
        .unwrap_err();
    match err {
        TopologyError::Routing(RoutingError::PriorityExhausted { tried, .. }) => {
            assert_eq!(tried, vec![42, 42, 42]);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The first rule stays registered; no teardown happens.
    assert_eq!(listener.snapshot().await.len(), 1);
}

#[tokio::test]
async fn provisioner_failure_surfaces_the_node() {
    let listener = shared_listener();
    let provisioner = InMemoryProvisioner::new().failing_on("productsacme");
    let b = ServiceTopologyBuilder::new(provisioner, listener.clone());
    let tenant = Tenant::new("acme", "acme", Tier::Basic);

    let err = b
        .build(&tenant, &TierProfile::for_tier(Tier::Basic), &orders_and_products())
        .await
        .unwrap_err();
    match err {
        TopologyError::Provision { node, reason } => {
            assert_eq!(node, "service/products");
            assert!(reason.contains("injected failure"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing applied for products after the failure.
    assert!(b
        .provisioner()
        .applied()
        .iter()
        .all(|r| r.name != "tg-products-acme"));
}

#[tokio::test]
async fn concurrent_tenant_builds_share_the_listener() {
    let listener = Arc::new(Listener::new("alb", Box::new(RandomDraw::seeded(11))));
    let b = Arc::new(builder(listener.clone()).with_rule_builder(RoutingRuleBuilder::new(10)));

    let mut handles = Vec::new();
    for i in 0..12 {
        let b = b.clone();
        handles.push(tokio::spawn(async move {
            let tier = if i % 2 == 0 { Tier::Basic } else { Tier::Advanced };
            let tenant = Tenant::new(&format!("tenant{i}"), &format!("tenant{i}"), tier);
            b.build(&tenant, &TierProfile::for_tier(tier), &orders_and_products())
                .await
                .unwrap()
        }));
    }

    let mut priorities = HashSet::new();
    let mut total = 0;
    for h in handles {
        let topology = h.await.unwrap();
        for rule in &topology.rules {
            total += 1;
            assert!(priorities.insert(rule.priority), "duplicate priority {}", rule.priority);
        }
    }
    // 6 pooled tenants × 2 rules + 6 siloed tenants × 1 rule.
    assert_eq!(total, 18);
    assert_eq!(listener.snapshot().await.len(), 18);
}

#[tokio::test]
async fn built_tenants_are_routed_in_isolation() {
    let listener = shared_listener();
    let b = builder(listener.clone());
    b.build(
        &Tenant::new("acme", "acme", Tier::Basic),
        &TierProfile::for_tier(Tier::Basic),
        &orders_and_products(),
    )
    .await
    .unwrap();
    b.build(
        &Tenant::new("acme2", "acme2", Tier::Premium),
        &TierProfile::for_tier(Tier::Premium),
        &orders_and_products(),
    )
    .await
    .unwrap();

    let req = RouteRequest::new("/products/9").header("tenantPath", "acme");
    assert!(matches!(
        listener.route(&req).await,
        RouteDecision::Forward { ref target_group, .. } if target_group.name == "tg-products-acme"
    ));

    let req = RouteRequest::new("/products/9").header("tenantPath", "acme2");
    assert!(matches!(
        listener.route(&req).await,
        RouteDecision::Forward { ref service_name, .. } if service_name == "rproxy"
    ));

    let req = RouteRequest::new("/products/9");
    assert_eq!(listener.route(&req).await, RouteDecision::Rejected { status: 404 });
}

#[tokio::test]
async fn persisted_rules_and_topology_survive_reload() {
    let store = StateStore::open_in_memory().unwrap();
    let listener = Arc::new(Listener::load("alb", Box::new(Sequential), store.clone()).unwrap());
    let b = builder(listener);
    let topology = b
        .build(
            &Tenant::new("acme", "acme", Tier::Basic),
            &TierProfile::for_tier(Tier::Basic),
            &orders_and_products(),
        )
        .await
        .unwrap();
    store.put_topology(&topology.to_record(1)).unwrap();

    let reloaded = Listener::load("alb", Box::new(Sequential), store.clone()).unwrap();
    assert_eq!(reloaded.snapshot().await.len(), 2);
    let record = store.get_topology("acme").unwrap().unwrap();
    assert_eq!(record.services, vec!["orders", "products"]);
}
