use crate::upstream::host::HostRef;
use crate::upstream::types::{Health, Locality};
use ahash::AHashMap;
use std::sync::Arc;

/// Per-locality slice of a host set.
#[derive(Debug, Clone)]
pub struct LocalityHosts {
    locality: Locality,
    weight: u32,
    hosts: Vec<HostRef>,
    active_count: usize,
    healthy: Vec<HostRef>,
    degraded: Vec<HostRef>,
}

impl LocalityHosts {
    fn new(locality: Locality) -> Self {
        Self {
            locality,
            weight: 0,
            hosts: Vec::new(),
            active_count: 0,
            healthy: Vec::new(),
            degraded: Vec::new(),
        }
    }

    pub fn locality(&self) -> &Locality {
        &self.locality
    }

    /// Configured weight, or the number of non-excluded hosts when the
    /// locality has no explicit weight.
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Every host in the locality, excluded ones included.
    pub fn hosts(&self) -> &[HostRef] {
        &self.hosts
    }

    pub fn healthy_hosts(&self) -> &[HostRef] {
        &self.healthy
    }

    pub fn degraded_hosts(&self) -> &[HostRef] {
        &self.degraded
    }

    /// Hosts that are not administratively excluded.
    pub fn active_count(&self) -> usize {
        self.active_count
    }
}

/// Immutable view of one priority tier.
///
/// Built off to the side from a host list and published as a whole; all
/// derived views reflect the host statuses read once during the build.
#[derive(Debug, Clone)]
pub struct HostSet {
    priority: u32,
    overprovisioning_factor: u32,
    hosts: Vec<HostRef>,
    active_hosts: Vec<HostRef>,
    healthy_hosts: Vec<HostRef>,
    degraded_hosts: Vec<HostRef>,
    excluded_hosts: Vec<HostRef>,
    localities: Vec<LocalityHosts>,
    locality_index: AHashMap<Locality, usize>,
    explicit_locality_weights: Arc<AHashMap<Locality, u32>>,
}

impl HostSet {
    pub(crate) fn empty(priority: u32, overprovisioning_factor: u32) -> Self {
        Self::build(
            priority,
            Vec::new(),
            Arc::new(AHashMap::new()),
            overprovisioning_factor,
        )
    }

    pub(crate) fn build(
        priority: u32,
        hosts: Vec<HostRef>,
        explicit_locality_weights: Arc<AHashMap<Locality, u32>>,
        overprovisioning_factor: u32,
    ) -> Self {
        let mut active_hosts = Vec::with_capacity(hosts.len());
        let mut healthy_hosts = Vec::with_capacity(hosts.len());
        let mut degraded_hosts = Vec::new();
        let mut excluded_hosts = Vec::new();
        let mut localities: Vec<LocalityHosts> = Vec::new();
        let mut locality_index: AHashMap<Locality, usize> = AHashMap::new();

        for host in &hosts {
            let idx = *locality_index
                .entry(host.locality().clone())
                .or_insert_with(|| {
                    localities.push(LocalityHosts::new(host.locality().clone()));
                    localities.len() - 1
                });
            let bucket = &mut localities[idx];
            bucket.hosts.push(host.clone());

            let (health, excluded) = host.status();
            if excluded {
                excluded_hosts.push(host.clone());
                continue;
            }

            bucket.active_count += 1;
            active_hosts.push(host.clone());

            match health {
                Health::Healthy => {
                    healthy_hosts.push(host.clone());
                    bucket.healthy.push(host.clone());
                }
                Health::Degraded => {
                    degraded_hosts.push(host.clone());
                    bucket.degraded.push(host.clone());
                }
                Health::Unhealthy => {}
            }
        }

        // Once any locality is weighted explicitly, unlisted ones get no
        // traffic rather than a weight in a different unit.
        let explicit = !explicit_locality_weights.is_empty();
        for bucket in &mut localities {
            bucket.weight = match explicit_locality_weights.get(&bucket.locality) {
                Some(weight) => *weight,
                None if explicit => 0,
                None => bucket.active_count as u32,
            };
        }

        Self {
            priority,
            overprovisioning_factor,
            hosts,
            active_hosts,
            healthy_hosts,
            degraded_hosts,
            excluded_hosts,
            localities,
            locality_index,
            explicit_locality_weights,
        }
    }

    /// Re-derive every view from the current host statuses.
    pub(crate) fn rederive(&self) -> Self {
        Self::build(
            self.priority,
            self.hosts.clone(),
            self.explicit_locality_weights.clone(),
            self.overprovisioning_factor,
        )
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn overprovisioning_factor(&self) -> u32 {
        self.overprovisioning_factor
    }

    /// All hosts in update order.
    pub fn hosts(&self) -> &[HostRef] {
        &self.hosts
    }

    /// Every host that is not excluded, whatever its health.
    pub fn active_hosts(&self) -> &[HostRef] {
        &self.active_hosts
    }

    pub fn healthy_hosts(&self) -> &[HostRef] {
        &self.healthy_hosts
    }

    pub fn degraded_hosts(&self) -> &[HostRef] {
        &self.degraded_hosts
    }

    pub fn excluded_hosts(&self) -> &[HostRef] {
        &self.excluded_hosts
    }

    /// Localities in order of first appearance in `hosts()`.
    pub fn hosts_per_locality(&self) -> &[LocalityHosts] {
        &self.localities
    }

    pub fn locality(&self, locality: &Locality) -> Option<(usize, &LocalityHosts)> {
        let idx = *self.locality_index.get(locality)?;
        Some((idx, &self.localities[idx]))
    }

    pub fn locality_at(&self, idx: usize) -> Option<&LocalityHosts> {
        self.localities.get(idx)
    }

    pub fn has_explicit_locality_weights(&self) -> bool {
        !self.explicit_locality_weights.is_empty()
    }

    pub(crate) fn explicit_locality_weights(&self) -> &Arc<AHashMap<Locality, u32>> {
        &self.explicit_locality_weights
    }

    /// Number of hosts that count toward availability.
    pub fn total_count(&self) -> usize {
        self.active_hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_hosts.is_empty()
    }

    /// Locality weight scaled down by the share of the locality that is
    /// healthy, allowing for overprovisioning. Zero for an empty locality.
    pub fn effective_locality_weight(&self, idx: usize) -> f64 {
        let Some(bucket) = self.localities.get(idx) else {
            return 0.0;
        };
        if bucket.active_count == 0 {
            return 0.0;
        }

        let factor = self.overprovisioning_factor as f64 / 100.0;
        let healthy_ratio = bucket.healthy.len() as f64 / bucket.active_count as f64;
        bucket.weight as f64 * (factor * healthy_ratio).min(1.0)
    }

    /// Same as [`HostSet::effective_locality_weight`] but over the degraded
    /// hosts of the locality.
    pub fn effective_degraded_locality_weight(&self, idx: usize) -> f64 {
        let Some(bucket) = self.localities.get(idx) else {
            return 0.0;
        };
        if bucket.active_count == 0 {
            return 0.0;
        }

        let factor = self.overprovisioning_factor as f64 / 100.0;
        let degraded_ratio = bucket.degraded.len() as f64 / bucket.active_count as f64;
        bucket.weight as f64 * (factor * degraded_ratio).min(1.0)
    }
}
