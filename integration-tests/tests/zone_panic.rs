use hostway_core::conf::types::{LoadBalancingStrategy, ZoneAwareConfig};
use hostway_core::traffic::{DecisionReason, LoadBalancer, LoadBalancerContext};
use hostway_core::upstream::{Health, Locality, PrioritySet};
use integration_tests::harness::{endpoints, priority_set};
use std::sync::Arc;

fn zone(name: &str) -> Locality {
    Locality::zone("eu-west", name)
}

/// Upstream with ten hosts per zone; `down` of zone a's are unhealthy.
fn upstream(down: usize) -> Arc<PrioritySet> {
    let mut hosts = endpoints("a-", &zone("a"), 10, down);
    hosts.extend(endpoints("b-", &zone("b"), 10, 0));
    hosts.extend(endpoints("c-", &zone("c"), 10, 0));
    priority_set(vec![hosts])
}

fn proxies() -> Arc<PrioritySet> {
    let mut hosts = endpoints("proxy-a-", &zone("a"), 4, 0);
    hosts.extend(endpoints("proxy-b-", &zone("b"), 4, 0));
    hosts.extend(endpoints("proxy-c-", &zone("c"), 4, 0));
    priority_set(vec![hosts])
}

#[test]
fn mostly_down_local_locality_falls_back_to_global_pool() {
    // Arrange: 8 of 10 hosts in zone a are down.
    let mut lb = LoadBalancer::zone_aware(
        upstream(8),
        proxies(),
        LoadBalancingStrategy::Random,
        ZoneAwareConfig::default(),
    )
    .with_seed(4);
    let here = zone("a");
    let mut ctx = LoadBalancerContext::new().with_local_locality(&here);

    // Act
    let mut outside = 0;
    let mut reasons = Vec::new();
    for _ in 0..1000 {
        let decision = lb.decide(&mut ctx).unwrap();
        reasons.push(decision.reason);
        if decision.host.locality() != &here {
            outside += 1;
        }
    }

    // Assert: 20 of 22 healthy hosts sit outside zone a.
    assert!(reasons.iter().all(|r| *r == DecisionReason::LocalityPanic));
    assert!(outside > 850, "only {outside} picks left zone a");
}

#[test]
fn recovered_locality_takes_local_traffic_again() {
    // Arrange
    let upstream = upstream(8);
    let mut lb = LoadBalancer::zone_aware(
        upstream.clone(),
        proxies(),
        LoadBalancingStrategy::RoundRobin,
        ZoneAwareConfig::default(),
    );
    let here = zone("a");
    let mut ctx = LoadBalancerContext::new().with_local_locality(&here);
    assert_eq!(lb.decide(&mut ctx).unwrap().reason, DecisionReason::LocalityPanic);

    // Act
    let down: Vec<_> = upstream
        .snapshot()
        .host_set(0)
        .unwrap()
        .hosts()
        .iter()
        .filter(|h| h.health() == Health::Unhealthy)
        .cloned()
        .collect();
    upstream.set_health_batch(0, down.into_iter().map(|h| (h, Health::Healthy)));

    // Assert
    for _ in 0..50 {
        let decision = lb.decide(&mut ctx).unwrap();
        assert_eq!(decision.reason, DecisionReason::LocalityDirect);
        assert_eq!(decision.host.locality(), &here);
    }
}

#[test]
fn half_down_locality_is_not_in_panic() {
    // Arrange: 5 of 10 up gives 70% with the default overprovisioning.
    let mut lb = LoadBalancer::zone_aware(
        upstream(5),
        proxies(),
        LoadBalancingStrategy::RoundRobin,
        ZoneAwareConfig::default(),
    )
    .with_seed(9);
    let here = zone("a");
    let mut ctx = LoadBalancerContext::new().with_local_locality(&here);

    // Act
    let decision = lb.decide(&mut ctx).unwrap();

    // Assert: zone a lost capacity, so some traffic spills elsewhere.
    assert_ne!(decision.reason, DecisionReason::LocalityPanic);
    assert_ne!(decision.reason, DecisionReason::LocalityDirect);
}
