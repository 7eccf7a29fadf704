use crate::conf::types::ZoneAwareConfig;
use crate::traffic::decision::DecisionReason;
use crate::traffic::priority::healthy_percent;
use crate::upstream::{HostSet, Locality};
use rand::{Rng, RngCore};
use smallvec::SmallVec;

/// Shares are expressed in hundredths of a percent.
pub const BASIS_POINTS: u64 = 10_000;

/// How requests from one local locality are spread over upstream localities.
///
/// Derived from the upstream tier 0 and the local cluster's tier 0 and only
/// valid for the snapshots it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneRoute {
    /// Locality routing does not apply; use the whole pool.
    Global,
    /// The local locality has too few usable hosts; use the whole pool.
    LocalityPanic,
    /// The local locality can take all of the local traffic.
    Direct { local: usize },
    /// Route locally `local_percent` basis points of the time, and spread the
    /// rest over the other localities by residual capacity.
    Residual {
        local: usize,
        local_percent: u64,
        /// Cumulative residual capacity per upstream locality, in basis
        /// points. The local locality contributes nothing.
        residual: SmallVec<[u64; 8]>,
    },
}

impl ZoneRoute {
    pub fn compute(
        upstream: &HostSet,
        local_cluster: &HostSet,
        local_locality: &Locality,
        zone_aware: &ZoneAwareConfig,
        healthy_panic_threshold: u32,
    ) -> Self {
        let localities = upstream.hosts_per_locality();
        if localities.len() < 2 {
            return Self::Global;
        }

        let Some((local_idx, local_hosts)) = upstream.locality(local_locality) else {
            return Self::Global;
        };

        let min_size = zone_aware.min_cluster_size as usize;
        if local_cluster.total_count() < min_size || upstream.healthy_hosts().len() < min_size {
            return Self::Global;
        }

        if healthy_percent(local_cluster) < healthy_panic_threshold {
            return Self::Global;
        }

        let active = local_hosts.active_count() as u64;
        let usable = (local_hosts.healthy_hosts().len() + local_hosts.degraded_hosts().len()) as u64;
        let locality_percent = if active == 0 {
            0
        } else {
            (u64::from(upstream.overprovisioning_factor()) * usable / active).min(100)
        };
        if locality_percent < u64::from(healthy_panic_threshold) {
            tracing::trace!(
                locality = %local_locality,
                percent = locality_percent,
                "local locality in panic"
            );
            return Self::LocalityPanic;
        }

        let Some(upstream_share) = upstream_shares(upstream) else {
            return Self::Global;
        };
        let Some(local_share) = local_shares(upstream, local_cluster) else {
            return Self::Global;
        };

        if upstream_share[local_idx] >= local_share[local_idx] {
            return Self::Direct { local: local_idx };
        }

        let local_percent = upstream_share[local_idx] * BASIS_POINTS / local_share[local_idx];

        let mut total = 0u64;
        let residual = upstream_share
            .iter()
            .zip(local_share.iter())
            .enumerate()
            .map(|(i, (&up, &down))| {
                if i != local_idx {
                    total += up.saturating_sub(down);
                }
                total
            })
            .collect();

        Self::Residual {
            local: local_idx,
            local_percent,
            residual,
        }
    }

    /// The upstream locality to use for one request, or `None` to use the
    /// whole pool.
    pub fn route(&self, rng: &mut dyn RngCore) -> Option<(usize, DecisionReason)> {
        match self {
            Self::Global | Self::LocalityPanic => None,
            Self::Direct { local } => Some((*local, DecisionReason::LocalityDirect)),
            Self::Residual {
                local,
                local_percent,
                residual,
            } => {
                if rng.random_range(0..BASIS_POINTS) < *local_percent {
                    return Some((*local, DecisionReason::LocalityLocal));
                }

                let total = residual.last().copied().unwrap_or(0);
                if total == 0 {
                    return None;
                }

                let point = rng.random_range(0..total);
                let idx = residual.partition_point(|&c| c <= point);
                Some((idx, DecisionReason::LocalityResidual))
            }
        }
    }
}

/// Share of the upstream tier's healthy capacity held by each locality.
/// Capacity is the locality weight scaled by its healthy fraction.
fn upstream_shares(upstream: &HostSet) -> Option<SmallVec<[u64; 8]>> {
    let capacity: SmallVec<[f64; 8]> = upstream
        .hosts_per_locality()
        .iter()
        .map(|l| {
            if l.active_count() == 0 {
                0.0
            } else {
                f64::from(l.weight()) * l.healthy_hosts().len() as f64 / l.active_count() as f64
            }
        })
        .collect();

    let total: f64 = capacity.iter().sum();
    if total <= 0.0 {
        return None;
    }

    Some(
        capacity
            .iter()
            .map(|c| (c / total * BASIS_POINTS as f64) as u64)
            .collect(),
    )
}

/// Share of the local cluster's healthy hosts sitting in each upstream
/// locality. Local localities with no upstream counterpart only count
/// toward the total.
fn local_shares(upstream: &HostSet, local_cluster: &HostSet) -> Option<SmallVec<[u64; 8]>> {
    let total = local_cluster.healthy_hosts().len() as u64;
    if total == 0 {
        return None;
    }

    Some(
        upstream
            .hosts_per_locality()
            .iter()
            .map(|l| {
                let healthy = local_cluster
                    .locality(l.locality())
                    .map(|(_, lh)| lh.healthy_hosts().len() as u64)
                    .unwrap_or(0);
                healthy * BASIS_POINTS / total
            })
            .collect(),
    )
}
