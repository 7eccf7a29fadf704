use crate::conf::ConfigError;
use crate::conf::types::{ClusterConfig, ClustersConfig, LoadBalancerConfig};
use crate::upstream::{HostSpec, MAX_PRIORITY};
use ahash::AHashSet;

/// Validate a whole clusters file, aggregating every error found.
pub fn validate_clusters(cfg: &ClustersConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    let mut seen = AHashSet::new();

    for cluster in &cfg.clusters {
        if !cluster.name.is_empty() && !seen.insert(cluster.name.as_str()) {
            errors.push(ConfigError::DuplicateCluster {
                name: cluster.name.clone(),
            });
        }
        validate_cluster(cluster, &mut errors);
    }

    if let Some(local) = &cfg.local_cluster {
        if !seen.contains(local.as_str()) {
            errors.push(ConfigError::UnknownLocalCluster {
                name: local.clone(),
            });
        }
    }

    ConfigError::from_errors(errors)
}

pub fn validate_cluster(cluster: &ClusterConfig, errors: &mut Vec<ConfigError>) {
    if cluster.name.is_empty() {
        errors.push(ConfigError::EmptyClusterName);
    }

    validate_load_balancer(&cluster.name, &cluster.load_balancer, errors);

    if cluster.priorities.len() > MAX_PRIORITY as usize + 1 {
        errors.push(ConfigError::PriorityOutOfRange {
            priority: cluster.priorities.len() as u32 - 1,
            max: MAX_PRIORITY,
        });
        return;
    }

    for (priority, tier) in cluster.priorities.iter().enumerate() {
        validate_hosts(
            priority as u32,
            &tier.host_specs(),
            tier.locality_weights.iter().map(|lw| lw.weight),
            errors,
        );
    }
}

pub fn validate_load_balancer(
    cluster: &str,
    lb: &LoadBalancerConfig,
    errors: &mut Vec<ConfigError>,
) {
    if lb.overprovisioning_factor == 0 {
        errors.push(ConfigError::InvalidOverprovisioningFactor {
            value: lb.overprovisioning_factor,
        });
    }

    if lb.healthy_panic_threshold > 100 {
        errors.push(ConfigError::InvalidPercent {
            what: "healthy panic threshold",
            value: lb.healthy_panic_threshold,
        });
    }

    if lb.least_request_choice_count < 2 {
        errors.push(ConfigError::InvalidChoiceCount {
            value: lb.least_request_choice_count,
        });
    }

    if let Some(zone_aware) = &lb.zone_aware {
        if zone_aware.routing_enabled_percent > 100 {
            errors.push(ConfigError::InvalidPercent {
                what: "zone-aware routing enabled percent",
                value: zone_aware.routing_enabled_percent,
            });
        }

        if zone_aware.enabled && lb.locality_weighted {
            errors.push(ConfigError::ConflictingLocalityModes {
                cluster: cluster.to_string(),
            });
        }
    }
}

/// Checks shared by config validation and `PrioritySet::update_hosts`.
///
/// A zero host weight is not an error; it is clamped when the host is built.
pub fn validate_hosts(
    priority: u32,
    hosts: &[HostSpec],
    locality_weights: impl IntoIterator<Item = u32>,
    errors: &mut Vec<ConfigError>,
) {
    if priority > MAX_PRIORITY {
        errors.push(ConfigError::PriorityOutOfRange {
            priority,
            max: MAX_PRIORITY,
        });
    }

    let mut seen = AHashSet::with_capacity(hosts.len());
    let mut weight_sum: u64 = 0;

    for host in hosts {
        if host.address.is_empty() {
            errors.push(ConfigError::EmptyAddress { priority });
            continue;
        }

        if !seen.insert(host.address.as_str()) {
            errors.push(ConfigError::DuplicateHost {
                address: host.address.clone(),
                priority,
            });
        }

        weight_sum += u64::from(host.weight.max(1));
    }

    if weight_sum > u64::from(u32::MAX) {
        errors.push(ConfigError::WeightOverflow {
            priority,
            what: "host",
        });
    }

    let locality_sum: u64 = locality_weights.into_iter().map(u64::from).sum();
    if locality_sum > u64::from(u32::MAX) {
        errors.push(ConfigError::WeightOverflow {
            priority,
            what: "locality",
        });
    }
}
