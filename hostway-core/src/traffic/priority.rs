use crate::upstream::{HostSet, PrioritySnapshot};
use smallvec::SmallVec;

/// Which health pool of a tier a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostAvailability {
    Healthy,
    Degraded,
}

/// Availability percentages of one tier.
///
/// `total = min(100, (100 * healthy + factor * degraded) / hosts)`, where
/// `factor` is the overprovisioning factor as a percentage. The healthy pool
/// claims up to `factor * healthy / hosts` of it first; the degraded pool
/// gets the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierAvailability {
    pub total: u32,
    pub healthy: u32,
    pub degraded: u32,
}

impl TierAvailability {
    pub fn of(host_set: &HostSet) -> Self {
        let hosts = host_set.total_count() as u64;
        if hosts == 0 {
            return Self::default();
        }

        let factor = u64::from(host_set.overprovisioning_factor());
        let healthy = host_set.healthy_hosts().len() as u64;
        let degraded = host_set.degraded_hosts().len() as u64;

        let total = ((100 * healthy + factor * degraded) / hosts).min(100) as u32;
        let healthy_share = ((factor * healthy) / hosts).min(u64::from(total)) as u32;

        Self {
            total,
            healthy: healthy_share,
            degraded: total - healthy_share,
        }
    }
}

/// Percentage of hosts that are healthy or degraded, ignoring
/// overprovisioning.
pub fn healthy_percent(host_set: &HostSet) -> u32 {
    let hosts = host_set.total_count();
    if hosts == 0 {
        return 0;
    }
    let usable = host_set.healthy_hosts().len() + host_set.degraded_hosts().len();
    (100 * usable / hosts) as u32
}

/// How 100% of traffic is spread across tiers and their health pools.
///
/// Tiers are filled in priority order; a tier that is only partly
/// available passes the remainder down to the next one. When the tiers
/// together are less than 100% available the loads are scaled up so they
/// still sum to 100.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityLoad {
    healthy: SmallVec<[u32; 4]>,
    degraded: SmallVec<[u32; 4]>,
    panic: SmallVec<[bool; 4]>,
}

impl PriorityLoad {
    pub fn compute(snapshot: &PrioritySnapshot, healthy_panic_threshold: u32) -> Self {
        let tiers = snapshot.host_sets();
        let availability: SmallVec<[TierAvailability; 4]> =
            tiers.iter().map(|hs| TierAvailability::of(hs)).collect();
        let panic = tiers
            .iter()
            .map(|hs| !hs.is_empty() && healthy_percent(hs) < healthy_panic_threshold)
            .collect();

        let mut healthy: SmallVec<[u32; 4]> = SmallVec::from_elem(0, tiers.len());
        let mut degraded: SmallVec<[u32; 4]> = SmallVec::from_elem(0, tiers.len());

        let normalized_total = availability
            .iter()
            .map(|a| a.total)
            .sum::<u32>()
            .min(100);

        if normalized_total == 0 {
            return Self {
                healthy,
                degraded,
                panic,
            };
        }

        let mut remaining = 100u32;
        let mut loads: SmallVec<[u32; 4]> = SmallVec::from_elem(0, tiers.len());
        for (i, a) in availability.iter().enumerate() {
            let load = remaining.min(a.total * 100 / normalized_total);
            loads[i] = load;
            remaining -= load;
        }

        // Integer rounding leftovers go to the first available tier.
        if remaining > 0 {
            if let Some(first) = availability.iter().position(|a| a.total > 0) {
                loads[first] += remaining;
            }
        }

        for (i, a) in availability.iter().enumerate() {
            if a.total == 0 {
                continue;
            }
            healthy[i] = loads[i] * a.healthy / a.total;
            degraded[i] = loads[i] - healthy[i];
        }

        Self {
            healthy,
            degraded,
            panic,
        }
    }

    /// Pick a tier and pool from a uniform draw. `None` when no tier has any
    /// availability.
    pub fn choose(&self, draw: u64) -> Option<(u32, HostAvailability)> {
        if self.is_unavailable() {
            return None;
        }

        let mut point = (draw % 100) as u32;
        for (i, (&h, &d)) in self.healthy.iter().zip(self.degraded.iter()).enumerate() {
            if point < h {
                return Some((i as u32, HostAvailability::Healthy));
            }
            point -= h;
            if point < d {
                return Some((i as u32, HostAvailability::Degraded));
            }
            point -= d;
        }

        None
    }

    pub fn is_unavailable(&self) -> bool {
        self.healthy.iter().chain(self.degraded.iter()).all(|&l| l == 0)
    }

    pub fn healthy_load(&self) -> &[u32] {
        &self.healthy
    }

    pub fn degraded_load(&self) -> &[u32] {
        &self.degraded
    }

    /// Whether a tier has fewer usable hosts than the panic threshold.
    pub fn in_panic(&self, priority: u32) -> bool {
        self.panic.get(priority as usize).copied().unwrap_or(false)
    }
}
