use crate::conf::{ConfigError, validate_hosts};
use crate::upstream::host::{Host, HostRef};
use crate::upstream::host_set::HostSet;
use crate::upstream::types::{Health, Locality};
use ahash::{AHashMap, AHashSet};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub const DEFAULT_OVERPROVISIONING_FACTOR: u32 = 140;

/// Highest priority index a tier may use.
pub const MAX_PRIORITY: u32 = 127;

/// One endpoint as delivered by discovery.
///
/// `health` and `excluded` are optional: when unset, a host that survives
/// the update keeps its current status and a new host starts healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub address: String,
    pub weight: u32,
    pub locality: Locality,
    pub health: Option<Health>,
    pub excluded: Option<bool>,
}

impl HostSpec {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: 1,
            locality: Locality::default(),
            health: None,
            excluded: None,
        }
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn locality(mut self, locality: Locality) -> Self {
        self.locality = locality;
        self
    }

    pub fn health(mut self, health: Health) -> Self {
        self.health = Some(health);
        self
    }

    pub fn excluded(mut self, excluded: bool) -> Self {
        self.excluded = Some(excluded);
        self
    }
}

/// Delivered to subscribers after a change has been published.
///
/// Health-only re-derivations carry empty deltas.
#[derive(Debug, Clone)]
pub struct PriorityUpdate {
    pub priority: u32,
    pub generation: u64,
    pub hosts_added: Vec<HostRef>,
    pub hosts_removed: Vec<HostRef>,
}

/// Complete, immutable state of every tier at one generation.
#[derive(Debug, Clone, Default)]
pub struct PrioritySnapshot {
    generation: u64,
    host_sets: Vec<Arc<HostSet>>,
}

impl PrioritySnapshot {
    /// Monotonic; bumped by every publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn host_sets(&self) -> &[Arc<HostSet>] {
        &self.host_sets
    }

    pub fn host_set(&self, priority: u32) -> Option<&Arc<HostSet>> {
        self.host_sets.get(priority as usize)
    }

    /// True when no tier has a single non-excluded host.
    pub fn is_empty(&self) -> bool {
        self.host_sets.iter().all(|hs| hs.is_empty())
    }
}

pub type UpdateCallback = Arc<dyn Fn(&PriorityUpdate) + Send + Sync>;

type Subscribers = Mutex<Vec<(u64, UpdateCallback)>>;

/// Unregisters its callback when dropped.
#[must_use = "dropping the subscription unregisters the callback"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// The tiers of one cluster.
///
/// Readers call [`PrioritySet::snapshot`] and never lock. Writers build a
/// complete new snapshot off to the side and swap it in; the writer mutex
/// only orders writers against each other.
pub struct PrioritySet {
    current: ArcSwap<PrioritySnapshot>,
    writer: Mutex<()>,
    subscribers: Arc<Subscribers>,
    next_subscriber: AtomicU64,
    overprovisioning_factor: AtomicU32,
}

impl fmt::Debug for PrioritySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrioritySet")
            .field("current", &self.current.load_full())
            .field("overprovisioning_factor", &self.overprovisioning_factor())
            .finish_non_exhaustive()
    }
}

impl Default for PrioritySet {
    fn default() -> Self {
        Self::new(DEFAULT_OVERPROVISIONING_FACTOR)
    }
}

impl PrioritySet {
    pub fn new(overprovisioning_factor: u32) -> Self {
        Self {
            current: ArcSwap::from_pointee(PrioritySnapshot::default()),
            writer: Mutex::new(()),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber: AtomicU64::new(0),
            overprovisioning_factor: AtomicU32::new(overprovisioning_factor),
        }
    }

    pub fn overprovisioning_factor(&self) -> u32 {
        self.overprovisioning_factor.load(Ordering::Relaxed)
    }

    /// Takes effect for each tier at its next update.
    pub fn set_overprovisioning_factor(&self, factor: u32) {
        self.overprovisioning_factor.store(factor, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Arc<PrioritySnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Register a callback fired after every committed change.
    ///
    /// Callbacks run synchronously on the writer's thread once the new
    /// snapshot is visible to readers.
    pub fn subscribe(
        &self,
        callback: impl Fn(&PriorityUpdate) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }
}

//-----------------------------------------------------------------------------
// Writers
//-----------------------------------------------------------------------------

impl PrioritySet {
    /// Replace the hosts of one tier wholesale.
    ///
    /// The update is validated before anything is built; a rejected update
    /// leaves the published snapshot untouched. Hosts whose address, weight
    /// and locality are unchanged are carried over as the same `Arc`, so
    /// their health and counters survive.
    pub fn update_hosts(
        &self,
        priority: u32,
        hosts: Vec<HostSpec>,
        locality_weights: HashMap<Locality, u32>,
    ) -> Result<PriorityUpdate, ConfigError> {
        if let Err(err) = validate_update(priority, &hosts, &locality_weights) {
            tracing::warn!(priority, error = %err, "rejected host update");
            return Err(err);
        }

        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let old = self.current.load_full();

        let existing: AHashMap<&str, &HostRef> = old
            .host_set(priority)
            .map(|hs| hs.hosts().iter().map(|h| (h.address(), h)).collect())
            .unwrap_or_default();

        let mut hosts_added = Vec::new();
        let mut kept: AHashSet<*const Host> = AHashSet::with_capacity(hosts.len());
        let mut next_hosts = Vec::with_capacity(hosts.len());

        for spec in hosts {
            let host = match existing.get(spec.address.as_str()) {
                Some(prev) if same_attributes(prev, &spec) => {
                    if let Some(health) = spec.health {
                        prev.set_health(health);
                    }
                    if let Some(excluded) = spec.excluded {
                        prev.set_excluded(excluded);
                    }
                    kept.insert(Arc::as_ptr(prev));
                    Arc::clone(prev)
                }
                Some(prev) => {
                    let (health, excluded) = prev.status();
                    let host = Arc::new(Host::with_status(
                        spec.address,
                        spec.weight,
                        spec.locality,
                        priority,
                        spec.health.unwrap_or(health),
                        spec.excluded.unwrap_or(excluded),
                    ));
                    hosts_added.push(host.clone());
                    host
                }
                None => {
                    let host = Arc::new(Host::with_status(
                        spec.address,
                        spec.weight,
                        spec.locality,
                        priority,
                        spec.health.unwrap_or_default(),
                        spec.excluded.unwrap_or(false),
                    ));
                    hosts_added.push(host.clone());
                    host
                }
            };
            next_hosts.push(host);
        }

        let hosts_removed: Vec<HostRef> = existing
            .values()
            .filter(|h| !kept.contains(&Arc::as_ptr(h)))
            .map(|h| Arc::clone(*h))
            .collect();

        let host_set = HostSet::build(
            priority,
            next_hosts,
            Arc::new(locality_weights.into_iter().collect()),
            self.overprovisioning_factor(),
        );

        let (total, healthy, degraded) = (
            host_set.hosts().len(),
            host_set.healthy_hosts().len(),
            host_set.degraded_hosts().len(),
        );

        let generation = self.publish(&old, priority, host_set);
        drop(writer);

        tracing::debug!(
            priority,
            generation,
            hosts = total,
            healthy,
            degraded,
            added = hosts_added.len(),
            removed = hosts_removed.len(),
            "host set updated"
        );

        let update = PriorityUpdate {
            priority,
            generation,
            hosts_added,
            hosts_removed,
        };
        self.notify(&update);

        Ok(update)
    }

    /// Re-derive the views of one tier from the hosts' current statuses.
    ///
    /// Returns `None` when the tier does not exist.
    pub fn refresh_health(&self, priority: u32) -> Option<PriorityUpdate> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let old = self.current.load_full();
        let host_set = old.host_set(priority)?.rederive();

        let generation = self.publish(&old, priority, host_set);
        drop(writer);

        let update = PriorityUpdate {
            priority,
            generation,
            hosts_added: Vec::new(),
            hosts_removed: Vec::new(),
        };
        self.notify(&update);

        Some(update)
    }

    /// Set one host's health and republish its tier if it changed.
    pub fn set_health(&self, host: &HostRef, health: Health) -> bool {
        if !host.set_health(health) {
            return false;
        }

        tracing::debug!(
            address = host.address(),
            priority = host.priority(),
            %health,
            "host health changed"
        );
        self.refresh_health(host.priority());
        true
    }

    /// Apply several health changes to one tier and republish it once.
    pub fn set_health_batch(
        &self,
        priority: u32,
        changes: impl IntoIterator<Item = (HostRef, Health)>,
    ) -> usize {
        let changed = changes
            .into_iter()
            .filter(|(host, health)| host.set_health(*health))
            .count();

        if changed > 0 {
            tracing::debug!(priority, changed, "host health batch applied");
            self.refresh_health(priority);
        }
        changed
    }

    /// Exclude (or re-admit) a host and republish its tier if it changed.
    pub fn set_excluded(&self, host: &HostRef, excluded: bool) -> bool {
        if !host.set_excluded(excluded) {
            return false;
        }

        tracing::debug!(
            address = host.address(),
            priority = host.priority(),
            excluded,
            "host exclusion changed"
        );
        self.refresh_health(host.priority());
        true
    }

    /// Must be called with the writer lock held.
    fn publish(&self, old: &PrioritySnapshot, priority: u32, host_set: HostSet) -> u64 {
        let mut host_sets = old.host_sets.clone();
        let idx = priority as usize;
        while host_sets.len() <= idx {
            let p = host_sets.len() as u32;
            host_sets.push(Arc::new(HostSet::empty(p, self.overprovisioning_factor())));
        }
        host_sets[idx] = Arc::new(host_set);

        let generation = old.generation + 1;
        self.current.store(Arc::new(PrioritySnapshot {
            generation,
            host_sets,
        }));
        generation
    }

    fn notify(&self, update: &PriorityUpdate) {
        // Clone out so callbacks may subscribe or drop subscriptions.
        let callbacks: Vec<UpdateCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for cb in callbacks {
            cb(update);
        }
    }
}

fn same_attributes(host: &Host, spec: &HostSpec) -> bool {
    host.weight() == spec.weight.max(1) && host.locality() == &spec.locality
}

fn validate_update(
    priority: u32,
    hosts: &[HostSpec],
    locality_weights: &HashMap<Locality, u32>,
) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    validate_hosts(priority, hosts, locality_weights.values().copied(), &mut errors);
    ConfigError::from_errors(errors)
}
