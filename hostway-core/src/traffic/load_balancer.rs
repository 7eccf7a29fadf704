use crate::conf::types::{LoadBalancerConfig, LoadBalancingStrategy, ZoneAwareConfig};
use crate::traffic::decision::{DecisionReason, HostsSource, SourceKind, TrafficDecision};
use crate::traffic::priority::{HostAvailability, PriorityLoad};
use crate::traffic::scheduler::EdfScheduler;
use crate::traffic::strategy::{TrafficStrategy, build_strategy};
use crate::traffic::types::{ClusterSettings, LoadBalancerContext, NoHealthyUpstream};
use crate::traffic::zone::ZoneRoute;
use crate::upstream::{HostRef, HostSet, Locality, PrioritySet, PrioritySnapshot};
use ahash::AHashMap;
use arc_swap::ArcSwap;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Host selection for one worker.
///
/// Each worker owns its own `LoadBalancer` over a shared [`PrioritySet`].
/// Schedulers and other derived state are cached against the snapshot they
/// were built from and rebuilt on first use after the snapshot changes, so a
/// pick is always drawn from the host list its scheduler was built over.
/// Schedulers whose pool did not change carry over to the new snapshot.
///
/// Settings are read from a shared [`ArcSwap`], so a reload of the cluster
/// reaches every worker on its next pick.
pub struct LoadBalancer {
    priority_set: Arc<PrioritySet>,
    local_priority_set: Option<Arc<PrioritySet>>,
    shared_settings: Arc<ArcSwap<ClusterSettings>>,
    settings: Arc<ClusterSettings>,
    rng: StdRng,
    worker: WorkerState,
    prefetched: VecDeque<Prefetched>,
}

/// A peeked decision and the local locality it was made for.
struct Prefetched {
    locality: Option<Locality>,
    decision: TrafficDecision,
}

impl fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("strategy", &self.settings.strategy)
            .field("config", &self.settings.load_balancer)
            .field("generation", &self.worker.snapshot.generation())
            .field("prefetched", &self.prefetched.len())
            .finish_non_exhaustive()
    }
}

impl LoadBalancer {
    pub fn new(
        priority_set: Arc<PrioritySet>,
        strategy: LoadBalancingStrategy,
        config: LoadBalancerConfig,
    ) -> Self {
        let settings = ClusterSettings {
            strategy,
            load_balancer: config,
        };
        Self::shared(priority_set, Arc::new(ArcSwap::from_pointee(settings)))
    }

    /// A load balancer following settings owned elsewhere, typically by a
    /// cluster that swaps them on reload.
    pub fn shared(
        priority_set: Arc<PrioritySet>,
        shared_settings: Arc<ArcSwap<ClusterSettings>>,
    ) -> Self {
        let settings = shared_settings.load_full();
        let worker = WorkerState::new(
            priority_set.snapshot(),
            settings.load_balancer.healthy_panic_threshold,
        );

        Self {
            priority_set,
            local_priority_set: None,
            shared_settings,
            settings,
            rng: StdRng::from_os_rng(),
            worker,
            prefetched: VecDeque::new(),
        }
    }

    pub fn round_robin(priority_set: Arc<PrioritySet>) -> Self {
        Self::new(
            priority_set,
            LoadBalancingStrategy::RoundRobin,
            LoadBalancerConfig::default(),
        )
    }

    pub fn random(priority_set: Arc<PrioritySet>) -> Self {
        Self::new(
            priority_set,
            LoadBalancingStrategy::Random,
            LoadBalancerConfig::default(),
        )
    }

    /// Zone-aware balancing on top of `strategy`, routing relative to the
    /// proxy fleet described by `local_cluster`.
    pub fn zone_aware(
        priority_set: Arc<PrioritySet>,
        local_cluster: Arc<PrioritySet>,
        strategy: LoadBalancingStrategy,
        zone_aware: ZoneAwareConfig,
    ) -> Self {
        let config = LoadBalancerConfig {
            zone_aware: Some(zone_aware),
            ..LoadBalancerConfig::default()
        };
        Self::new(priority_set, strategy, config).with_local_cluster(local_cluster)
    }

    pub fn with_local_cluster(mut self, local_cluster: Arc<PrioritySet>) -> Self {
        self.local_priority_set = Some(local_cluster);
        self
    }

    /// Seed the generator used when the context brings no randomness.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn priority_set(&self) -> &Arc<PrioritySet> {
        &self.priority_set
    }

    /// Strategy in effect, as of the last pick.
    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.settings.strategy
    }

    /// Settings in effect, as of the last pick.
    pub fn config(&self) -> &LoadBalancerConfig {
        &self.settings.load_balancer
    }

    /// Traffic split across tiers for the current snapshot.
    pub fn priority_load(&mut self) -> &PriorityLoad {
        self.refresh();
        &self.worker.load
    }

    pub fn choose_host(
        &mut self,
        ctx: &mut LoadBalancerContext<'_>,
    ) -> Result<HostRef, NoHealthyUpstream> {
        self.decide(ctx).map(|d| d.host)
    }

    /// Like [`LoadBalancer::choose_host`] but also reports which pool the
    /// host came from and why.
    pub fn decide(
        &mut self,
        ctx: &mut LoadBalancerContext<'_>,
    ) -> Result<TrafficDecision, NoHealthyUpstream> {
        self.refresh();

        // A peek made for another local locality may not be routed the way
        // this request would be.
        if let Some(next) = self.prefetched.pop_front() {
            if next.locality.as_ref() == ctx.local_locality() {
                return Ok(next.decision);
            }
            self.prefetched.clear();
        }

        self.select(ctx)
    }

    /// Pick the host a later `choose_host` will return, e.g. to warm a
    /// connection. Picks are queued, so peeking twice reserves two hosts.
    pub fn peek_another_host(&mut self, ctx: &mut LoadBalancerContext<'_>) -> Option<HostRef> {
        self.refresh();

        let decision = self.select(ctx).ok()?;
        let host = decision.host.clone();
        self.prefetched.push_back(Prefetched {
            locality: ctx.local_locality().cloned(),
            decision,
        });
        Some(host)
    }

    fn refresh(&mut self) {
        let settings_changed = {
            let latest = self.shared_settings.load();
            if Arc::ptr_eq(&*latest, &self.settings) {
                false
            } else {
                self.settings = Arc::clone(&*latest);
                true
            }
        };

        let generation = self.priority_set.generation();
        if !settings_changed && self.worker.snapshot.generation() == generation {
            return;
        }

        let snapshot = self.priority_set.snapshot();
        tracing::trace!(
            generation = snapshot.generation(),
            settings_changed,
            "rebuilding load balancer state"
        );

        let threshold = self.settings.load_balancer.healthy_panic_threshold;
        let mut next = WorkerState::new(snapshot, threshold);
        next.stagger = true;
        let previous = std::mem::replace(&mut self.worker, next);
        if !settings_changed {
            self.worker.inherit(previous);
        }
        self.prefetched.clear();
    }

    fn select(
        &mut self,
        ctx: &mut LoadBalancerContext<'_>,
    ) -> Result<TrafficDecision, NoHealthyUpstream> {
        let zone_aware = self.settings.load_balancer.zone_aware.as_ref();
        let zone_enabled = zone_aware.is_some_and(|z| z.enabled);
        let local_snapshot = match (&self.local_priority_set, ctx.local_locality()) {
            (Some(local), Some(_)) if zone_enabled => Some(local.snapshot()),
            _ => None,
        };
        let local = local_snapshot.as_deref().zip(ctx.local_locality());

        let rng: &mut dyn RngCore = match ctx.random() {
            Some(rng) => rng,
            None => &mut self.rng,
        };

        self.worker.select(
            self.settings.strategy,
            &self.settings.load_balancer,
            local,
            rng,
        )
    }
}

struct ZoneCache {
    local_generation: u64,
    locality: Locality,
    route: ZoneRoute,
}

/// Everything derived from one snapshot.
struct WorkerState {
    snapshot: Arc<PrioritySnapshot>,
    load: PriorityLoad,
    pickers: AHashMap<HostsSource, Box<dyn TrafficStrategy>>,
    locality_schedulers: AHashMap<(u32, HostAvailability), EdfScheduler<usize>>,
    zone: Option<ZoneCache>,
    /// Start new schedulers at a random position, so that workers rebuilding
    /// together do not all send their next pick to the same host.
    stagger: bool,
}

impl WorkerState {
    fn new(snapshot: Arc<PrioritySnapshot>, healthy_panic_threshold: u32) -> Self {
        let load = PriorityLoad::compute(&snapshot, healthy_panic_threshold);

        Self {
            snapshot,
            load,
            pickers: AHashMap::new(),
            locality_schedulers: AHashMap::new(),
            zone: None,
            stagger: false,
        }
    }

    /// Take over the schedulers of `previous` whose pool is unchanged in
    /// this snapshot.
    fn inherit(&mut self, previous: WorkerState) {
        let WorkerState {
            snapshot: old,
            pickers,
            locality_schedulers,
            zone,
            ..
        } = previous;

        for (source, picker) in pickers {
            let before = old.host_set(source.priority);
            let after = self.snapshot.host_set(source.priority);
            let kept = match (before, after) {
                (Some(before), Some(after)) => {
                    Arc::ptr_eq(before, after)
                        || same_hosts(source.hosts(before), source.hosts(after))
                }
                _ => false,
            };
            if kept {
                self.pickers.insert(source, picker);
            }
        }

        for ((priority, availability), scheduler) in locality_schedulers {
            let kept = match (old.host_set(priority), self.snapshot.host_set(priority)) {
                (Some(before), Some(after)) => {
                    Arc::ptr_eq(before, after) || same_locality_weights(before, after, availability)
                }
                _ => false,
            };
            if kept {
                self.locality_schedulers.insert((priority, availability), scheduler);
            }
        }

        if let (Some(before), Some(after)) = (old.host_set(0), self.snapshot.host_set(0)) {
            if Arc::ptr_eq(before, after) {
                self.zone = zone;
            }
        }
    }

    fn select(
        &mut self,
        strategy: LoadBalancingStrategy,
        config: &LoadBalancerConfig,
        local: Option<(&PrioritySnapshot, &Locality)>,
        rng: &mut dyn RngCore,
    ) -> Result<TrafficDecision, NoHealthyUpstream> {
        let choice_count = config.least_request_choice_count;

        let Some((priority, availability)) = self.load.choose(rng.next_u64()) else {
            return self.select_in_total_panic(strategy, config, rng);
        };

        if !config.fail_traffic_on_panic && self.load.in_panic(priority) {
            tracing::trace!(priority, "priority tier in panic");
            let source = HostsSource::new(priority, SourceKind::AllHosts);
            return self
                .pick(source, DecisionReason::TierPanic, strategy, choice_count, rng)
                .ok_or(NoHealthyUpstream);
        }

        let mut reason = DecisionReason::Priority;

        if priority == 0 && availability == HostAvailability::Healthy {
            let zone_aware = config.zone_aware.as_ref().filter(|z| z.enabled);
            if let (Some(zone_aware), Some((local_snapshot, locality))) = (zone_aware, local) {
                let attempt = zone_aware.routing_enabled_percent >= 100
                    || rng.random_range(0..100) < zone_aware.routing_enabled_percent;

                if attempt {
                    let route = self.zone_route(
                        local_snapshot,
                        locality,
                        zone_aware,
                        config.healthy_panic_threshold,
                    );
                    let panicked = matches!(route, ZoneRoute::LocalityPanic);

                    match route.route(rng) {
                        Some((idx, zone_reason)) => {
                            let source =
                                HostsSource::new(0, SourceKind::LocalityHealthyHosts(idx));
                            if let Some(d) = self.pick(source, zone_reason, strategy, choice_count, rng)
                            {
                                return Ok(d);
                            }
                        }
                        None if panicked => reason = DecisionReason::LocalityPanic,
                        None => {}
                    }
                }
            }
        }

        if config.locality_weighted {
            if let Some(idx) = self.pick_locality(priority, availability, rng) {
                let kind = match availability {
                    HostAvailability::Healthy => SourceKind::LocalityHealthyHosts(idx),
                    HostAvailability::Degraded => SourceKind::LocalityDegradedHosts(idx),
                };
                let source = HostsSource::new(priority, kind);
                if let Some(d) = self.pick(
                    source,
                    DecisionReason::LocalityWeighted,
                    strategy,
                    choice_count,
                    rng,
                ) {
                    return Ok(d);
                }
            }
        }

        let kind = match availability {
            HostAvailability::Healthy => SourceKind::HealthyHosts,
            HostAvailability::Degraded => SourceKind::DegradedHosts,
        };
        self.pick(
            HostsSource::new(priority, kind),
            reason,
            strategy,
            choice_count,
            rng,
        )
        .ok_or(NoHealthyUpstream)
    }

    /// No tier has any healthy or degraded host.
    fn select_in_total_panic(
        &mut self,
        strategy: LoadBalancingStrategy,
        config: &LoadBalancerConfig,
        rng: &mut dyn RngCore,
    ) -> Result<TrafficDecision, NoHealthyUpstream> {
        if config.fail_traffic_on_panic {
            return Err(NoHealthyUpstream);
        }

        let priority = self
            .snapshot
            .host_sets()
            .iter()
            .find(|hs| !hs.is_empty())
            .map(|hs| hs.priority())
            .ok_or(NoHealthyUpstream)?;

        tracing::trace!(priority, "no available tier, serving first tier in panic");
        self.pick(
            HostsSource::new(priority, SourceKind::AllHosts),
            DecisionReason::TierPanic,
            strategy,
            config.least_request_choice_count,
            rng,
        )
        .ok_or(NoHealthyUpstream)
    }

    fn pick(
        &mut self,
        source: HostsSource,
        reason: DecisionReason,
        strategy: LoadBalancingStrategy,
        choice_count: u32,
        rng: &mut dyn RngCore,
    ) -> Option<TrafficDecision> {
        let host_set = self.snapshot.host_set(source.priority)?;
        let stagger = self.stagger;
        let picker = self.pickers.entry(source).or_insert_with(|| {
            let hosts = source.hosts(host_set);
            let mut picker = build_strategy(strategy, hosts, choice_count);
            if stagger && hosts.len() > 1 {
                let skip = rng.random_range(0..hosts.len());
                picker.skip(skip, rng);
            }
            picker
        });

        let host = picker.pick(rng)?;
        Some(TrafficDecision {
            host,
            source,
            reason,
        })
    }

    fn pick_locality(
        &mut self,
        priority: u32,
        availability: HostAvailability,
        rng: &mut dyn RngCore,
    ) -> Option<usize> {
        let host_set = self.snapshot.host_set(priority)?;
        let stagger = self.stagger;
        let scheduler = self
            .locality_schedulers
            .entry((priority, availability))
            .or_insert_with(|| {
                let count = host_set.hosts_per_locality().len();
                let mut scheduler = EdfScheduler::with_capacity(count);
                for idx in 0..count {
                    scheduler.add(locality_weight(host_set, idx, availability), idx);
                }
                if stagger && scheduler.len() > 1 {
                    for _ in 0..rng.random_range(0..scheduler.len()) {
                        scheduler.pick();
                    }
                }
                scheduler
            });

        scheduler.pick()
    }

    fn zone_route(
        &mut self,
        local_snapshot: &PrioritySnapshot,
        locality: &Locality,
        zone_aware: &ZoneAwareConfig,
        healthy_panic_threshold: u32,
    ) -> &ZoneRoute {
        let fresh = self.zone.as_ref().is_some_and(|c| {
            c.local_generation == local_snapshot.generation() && c.locality == *locality
        });
        if !fresh {
            self.zone = None;
        }

        let snapshot = &self.snapshot;
        let cache = self.zone.get_or_insert_with(|| {
            let route = match (snapshot.host_set(0), local_snapshot.host_set(0)) {
                (Some(upstream), Some(local)) => ZoneRoute::compute(
                    upstream,
                    local,
                    locality,
                    zone_aware,
                    healthy_panic_threshold,
                ),
                _ => ZoneRoute::Global,
            };
            ZoneCache {
                local_generation: local_snapshot.generation(),
                locality: locality.clone(),
                route,
            }
        });

        &cache.route
    }
}

fn locality_weight(host_set: &HostSet, idx: usize, availability: HostAvailability) -> f64 {
    match availability {
        HostAvailability::Healthy => host_set.effective_locality_weight(idx),
        HostAvailability::Degraded => host_set.effective_degraded_locality_weight(idx),
    }
}

/// Same hosts in the same order. Hosts are immutable apart from their
/// status, so identity covers address, weight and locality.
fn same_hosts(before: &[HostRef], after: &[HostRef]) -> bool {
    before.len() == after.len() && before.iter().zip(after).all(|(a, b)| Arc::ptr_eq(a, b))
}

fn same_locality_weights(
    before: &HostSet,
    after: &HostSet,
    availability: HostAvailability,
) -> bool {
    let (old, new) = (before.hosts_per_locality(), after.hosts_per_locality());
    old.len() == new.len()
        && old.iter().zip(new).enumerate().all(|(idx, (a, b))| {
            a.locality() == b.locality()
                && locality_weight(before, idx, availability)
                    == locality_weight(after, idx, availability)
        })
}
