use crate::upstream::{HostRef, HostSet};

/// The pool of hosts a pick is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostsSource {
    pub priority: u32,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Every non-excluded host, whatever its health. Used in panic.
    AllHosts,
    HealthyHosts,
    DegradedHosts,
    LocalityHealthyHosts(usize),
    LocalityDegradedHosts(usize),
}

impl HostsSource {
    pub fn new(priority: u32, kind: SourceKind) -> Self {
        Self { priority, kind }
    }

    pub fn hosts<'a>(&self, host_set: &'a HostSet) -> &'a [HostRef] {
        match self.kind {
            SourceKind::AllHosts => host_set.active_hosts(),
            SourceKind::HealthyHosts => host_set.healthy_hosts(),
            SourceKind::DegradedHosts => host_set.degraded_hosts(),
            SourceKind::LocalityHealthyHosts(idx) => host_set
                .locality_at(idx)
                .map(|l| l.healthy_hosts())
                .unwrap_or_default(),
            SourceKind::LocalityDegradedHosts(idx) => host_set
                .locality_at(idx)
                .map(|l| l.degraded_hosts())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Plain pick from a tier's healthy or degraded pool.
    Priority,
    /// The tier was in panic and was widened to all of its hosts.
    TierPanic,
    /// Zone-aware: the local locality can absorb all local traffic.
    LocalityDirect,
    /// Zone-aware: routed locally with the corrective probability.
    LocalityLocal,
    /// Zone-aware: spilled over to a locality with residual capacity.
    LocalityResidual,
    /// Zone-aware routing was attempted but the local locality is in panic.
    LocalityPanic,
    /// Locality picked by effective locality weight.
    LocalityWeighted,
}

#[derive(Debug, Clone)]
pub struct TrafficDecision {
    pub host: HostRef,
    pub source: HostsSource,
    pub reason: DecisionReason,
}
