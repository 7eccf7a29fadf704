use hostway_core::traffic::{LoadBalancer, LoadBalancerContext};
use hostway_core::upstream::{Health, HostRef, HostSpec, Locality, PrioritySet};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// `count` hosts named `{prefix}{i}` in `locality`; the first `unhealthy`
/// of them are unhealthy.
pub fn endpoints(prefix: &str, locality: &Locality, count: usize, unhealthy: usize) -> Vec<HostSpec> {
    (0..count)
        .map(|i| {
            let health = if i < unhealthy {
                Health::Unhealthy
            } else {
                Health::Healthy
            };
            HostSpec::new(format!("{prefix}{i}"))
                .locality(locality.clone())
                .health(health)
        })
        .collect()
}

/// Hosts `{prefix}{i}` with the given weights, all healthy.
pub fn weighted(prefix: &str, weights: &[u32]) -> Vec<HostSpec> {
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| HostSpec::new(format!("{prefix}{i}")).weight(*w))
        .collect()
}

pub fn priority_set(tiers: Vec<Vec<HostSpec>>) -> Arc<PrioritySet> {
    let ps = Arc::new(PrioritySet::default());
    for (priority, hosts) in tiers.into_iter().enumerate() {
        ps.update_hosts(priority as u32, hosts, HashMap::new())
            .expect("valid host update");
    }
    ps
}

pub fn addresses(hosts: &[HostRef]) -> Vec<String> {
    hosts.iter().map(|h| h.address().to_string()).collect()
}

/// Run `picks` selections and count them per address.
pub fn tally(
    lb: &mut LoadBalancer,
    ctx: &mut LoadBalancerContext<'_>,
    picks: usize,
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for _ in 0..picks {
        let host = lb.choose_host(ctx).expect("a host");
        *counts.entry(host.address().to_string()).or_default() += 1;
    }
    counts
}

pub fn fixture(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(file)
}
