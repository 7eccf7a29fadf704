use super::{hosts_in, priority_set};
use crate::conf::types::{LoadBalancerConfig, LoadBalancingStrategy};
use crate::traffic::{
    DecisionReason, LoadBalancer, LoadBalancerContext, NoHealthyUpstream, SourceKind,
};
use crate::upstream::{Health, HostSpec, Locality, PrioritySet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;

fn count_by_address(lb: &mut LoadBalancer, picks: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    let mut ctx = LoadBalancerContext::new();
    for _ in 0..picks {
        let host = lb.choose_host(&mut ctx).unwrap();
        *counts.entry(host.address().to_string()).or_default() += 1;
    }
    counts
}

#[test]
fn round_robin_follows_weights() {
    // Arrange
    let ps = priority_set(vec![vec![
        HostSpec::new("a").weight(1),
        HostSpec::new("b").weight(3),
    ]]);
    let mut lb = LoadBalancer::round_robin(ps).with_seed(1);

    // Act
    let counts = count_by_address(&mut lb, 400);

    // Assert
    assert_eq!(counts["a"], 100);
    assert_eq!(counts["b"], 300);
}

#[test]
fn random_roughly_follows_weights() {
    let ps = priority_set(vec![vec![
        HostSpec::new("a").weight(1),
        HostSpec::new("b").weight(3),
    ]]);
    let mut lb = LoadBalancer::random(ps).with_seed(7);

    let counts = count_by_address(&mut lb, 4000);

    assert!((800..1200).contains(&counts["a"]), "a picked {}", counts["a"]);
}

#[test]
fn context_randomness_makes_picks_reproducible() {
    // Arrange
    let ps = priority_set(vec![hosts_in("h", &Locality::default(), 8, 0)]);
    let mut first = LoadBalancer::random(ps.clone());
    let mut second = LoadBalancer::random(ps);
    let mut rng_one = StdRng::seed_from_u64(99);
    let mut rng_two = StdRng::seed_from_u64(99);

    // Act
    let mut picks_one = Vec::new();
    let mut picks_two = Vec::new();
    for _ in 0..50 {
        let mut ctx = LoadBalancerContext::new().with_random(&mut rng_one);
        picks_one.push(first.choose_host(&mut ctx).unwrap().address().to_string());
        let mut ctx = LoadBalancerContext::new().with_random(&mut rng_two);
        picks_two.push(second.choose_host(&mut ctx).unwrap().address().to_string());
    }

    // Assert
    assert_eq!(picks_one, picks_two);
}

#[test]
fn empty_priority_set_has_no_healthy_upstream() {
    let mut lb = LoadBalancer::round_robin(Arc::new(PrioritySet::default()));
    let mut ctx = LoadBalancerContext::new();

    for _ in 0..10 {
        assert_eq!(lb.choose_host(&mut ctx).unwrap_err(), NoHealthyUpstream);
    }
}

#[test]
fn failover_sends_everything_to_next_tier() {
    // Arrange
    let ps = priority_set(vec![
        hosts_in("p0-", &Locality::default(), 5, 5),
        hosts_in("p1-", &Locality::default(), 2, 0),
    ]);
    let mut lb = LoadBalancer::round_robin(ps).with_seed(3);
    let mut ctx = LoadBalancerContext::new();

    // Act / Assert
    for _ in 0..100 {
        let decision = lb.decide(&mut ctx).unwrap();
        assert_eq!(decision.host.priority(), 1);
        assert_eq!(decision.source.kind, SourceKind::HealthyHosts);
        assert_eq!(decision.reason, DecisionReason::Priority);
    }
}

#[test]
fn all_unhealthy_fails_by_default() {
    let ps = priority_set(vec![hosts_in("h", &Locality::default(), 3, 3)]);
    let mut lb = LoadBalancer::round_robin(ps);

    let result = lb.choose_host(&mut LoadBalancerContext::new());

    assert_eq!(result.unwrap_err(), NoHealthyUpstream);
}

#[test]
fn all_unhealthy_serves_first_tier_in_panic_when_allowed() {
    // Arrange
    let ps = priority_set(vec![
        Vec::new(),
        hosts_in("p1-", &Locality::default(), 3, 3),
    ]);
    let config = LoadBalancerConfig {
        fail_traffic_on_panic: false,
        ..LoadBalancerConfig::default()
    };
    let mut lb = LoadBalancer::new(ps, LoadBalancingStrategy::RoundRobin, config);

    // Act
    let decision = lb.decide(&mut LoadBalancerContext::new()).unwrap();

    // Assert
    assert_eq!(decision.reason, DecisionReason::TierPanic);
    assert_eq!(decision.source.priority, 1);
    assert_eq!(decision.source.kind, SourceKind::AllHosts);
    assert_eq!(decision.host.health(), Health::Unhealthy);
}

#[test]
fn tier_in_panic_is_widened_to_all_hosts() {
    // Arrange: 1 of 5 healthy is below the 50% threshold.
    let ps = priority_set(vec![hosts_in("h", &Locality::default(), 5, 4)]);
    let config = LoadBalancerConfig {
        fail_traffic_on_panic: false,
        ..LoadBalancerConfig::default()
    };
    let mut lb = LoadBalancer::new(ps, LoadBalancingStrategy::RoundRobin, config);
    let mut ctx = LoadBalancerContext::new();

    // Act
    let decisions: Vec<_> = (0..5).map(|_| lb.decide(&mut ctx).unwrap()).collect();

    // Assert
    assert!(decisions.iter().all(|d| d.reason == DecisionReason::TierPanic));
    let unhealthy = decisions
        .iter()
        .filter(|d| d.host.health() == Health::Unhealthy)
        .count();
    assert_eq!(unhealthy, 4);
}

#[test]
fn degraded_only_tier_uses_degraded_pool() {
    let ps = priority_set(vec![vec![
        HostSpec::new("d1").health(Health::Degraded),
        HostSpec::new("d2").health(Health::Degraded),
    ]]);
    let mut lb = LoadBalancer::round_robin(ps);

    let decision = lb.decide(&mut LoadBalancerContext::new()).unwrap();

    assert_eq!(decision.source.kind, SourceKind::DegradedHosts);
    assert_eq!(decision.host.health(), Health::Degraded);
}

#[test]
fn new_snapshot_is_picked_up_on_next_choice() {
    // Arrange
    let ps = priority_set(vec![vec![HostSpec::new("old")]]);
    let mut lb = LoadBalancer::round_robin(ps.clone());
    let mut ctx = LoadBalancerContext::new();
    assert_eq!(lb.choose_host(&mut ctx).unwrap().address(), "old");

    // Act
    ps.update_hosts(0, vec![HostSpec::new("new")], HashMap::new())
        .unwrap();

    // Assert
    for _ in 0..3 {
        assert_eq!(lb.choose_host(&mut ctx).unwrap().address(), "new");
    }
}

#[test]
fn health_change_is_picked_up_on_next_choice() {
    let ps = priority_set(vec![vec![HostSpec::new("a"), HostSpec::new("b")]]);
    let mut lb = LoadBalancer::round_robin(ps.clone());
    let a = ps.snapshot().host_set(0).unwrap().hosts()[0].clone();

    ps.set_health(&a, Health::Unhealthy);

    let counts = count_by_address(&mut lb, 10);
    assert_eq!(counts.get("a"), None);
    assert_eq!(counts["b"], 10);
}

#[test]
fn peeked_hosts_are_returned_in_order() {
    // Arrange
    let ps = priority_set(vec![hosts_in("h", &Locality::default(), 3, 0)]);
    let mut lb = LoadBalancer::round_robin(ps);
    let mut ctx = LoadBalancerContext::new();

    // Act
    let first = lb.peek_another_host(&mut ctx).unwrap();
    let second = lb.peek_another_host(&mut ctx).unwrap();

    // Assert
    assert!(Arc::ptr_eq(&first, &lb.choose_host(&mut ctx).unwrap()));
    assert!(Arc::ptr_eq(&second, &lb.choose_host(&mut ctx).unwrap()));
    assert_eq!(lb.choose_host(&mut ctx).unwrap().address(), "h2");
}

#[test]
fn peeked_hosts_are_dropped_when_snapshot_changes() {
    let ps = priority_set(vec![vec![HostSpec::new("old")]]);
    let mut lb = LoadBalancer::round_robin(ps.clone());
    let mut ctx = LoadBalancerContext::new();
    lb.peek_another_host(&mut ctx).unwrap();

    ps.update_hosts(0, vec![HostSpec::new("new")], HashMap::new())
        .unwrap();

    assert_eq!(lb.choose_host(&mut ctx).unwrap().address(), "new");
}

#[test]
fn locality_weighted_picks_localities_by_weight() {
    // Arrange
    let a = Locality::zone("us", "a");
    let b = Locality::zone("us", "b");
    let ps = Arc::new(PrioritySet::default());
    let mut hosts = hosts_in("a", &a, 2, 0);
    hosts.extend(hosts_in("b", &b, 2, 0));
    ps.update_hosts(0, hosts, HashMap::from([(a.clone(), 1), (b.clone(), 3)]))
        .unwrap();
    let config = LoadBalancerConfig {
        locality_weighted: true,
        ..LoadBalancerConfig::default()
    };
    let mut lb = LoadBalancer::new(ps, LoadBalancingStrategy::RoundRobin, config);
    let mut ctx = LoadBalancerContext::new();

    // Act
    let mut in_b = 0;
    for _ in 0..400 {
        let decision = lb.decide(&mut ctx).unwrap();
        assert_eq!(decision.reason, DecisionReason::LocalityWeighted);
        if decision.host.locality() == &b {
            in_b += 1;
        }
    }

    // Assert
    assert_eq!(in_b, 300);
}

#[test]
fn least_request_strategy_is_selected_from_config() {
    let ps = priority_set(vec![hosts_in("h", &Locality::default(), 2, 0)]);
    let mut lb = LoadBalancer::new(
        ps,
        LoadBalancingStrategy::LeastRequest,
        LoadBalancerConfig::default(),
    )
    .with_seed(5);

    let counts = count_by_address(&mut lb, 100);

    assert_eq!(counts.values().sum::<usize>(), 100);
    assert_eq!(lb.strategy(), LoadBalancingStrategy::LeastRequest);
}
