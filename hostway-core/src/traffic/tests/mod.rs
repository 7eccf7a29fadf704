mod load_balancer_tests;

use crate::upstream::{Health, HostSpec, Locality, PrioritySet};
use std::collections::HashMap;
use std::sync::Arc;

/// `count` hosts named `{prefix}{i}`; the first `unhealthy` are unhealthy.
fn hosts_in(prefix: &str, locality: &Locality, count: usize, unhealthy: usize) -> Vec<HostSpec> {
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

fn priority_set(tiers: Vec<Vec<HostSpec>>) -> Arc<PrioritySet> {
    let ps = Arc::new(PrioritySet::default());
    for (priority, hosts) in tiers.into_iter().enumerate() {
        ps.update_hosts(priority as u32, hosts, HashMap::new())
            .unwrap();
    }
    ps
}
