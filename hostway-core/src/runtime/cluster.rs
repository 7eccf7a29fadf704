use crate::conf::types::ClusterConfig;
use crate::conf::{ConfigError, validate_cluster};
use crate::traffic::LoadBalancer;
use crate::upstream::PrioritySet;
use arc_swap::ArcSwap;
use std::sync::Arc;

pub use crate::traffic::ClusterSettings;

/// A named cluster: its tiers plus how to balance over them.
///
/// The priority set lives as long as the cluster; reloads update it in
/// place so workers holding it keep working. Settings are shared with every
/// load balancer the cluster hands out.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    priority_set: Arc<PrioritySet>,
    settings: Arc<ArcSwap<ClusterSettings>>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, settings: ClusterSettings) -> Self {
        Self {
            name: name.into(),
            priority_set: Arc::new(PrioritySet::new(
                settings.load_balancer.overprovisioning_factor,
            )),
            settings: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn from_config(cfg: &ClusterConfig) -> Result<Self, ConfigError> {
        let cluster = Self::new(
            &cfg.name,
            ClusterSettings {
                strategy: cfg.strategy,
                load_balancer: cfg.load_balancer.clone(),
            },
        );
        cluster.apply(cfg)?;
        Ok(cluster)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority_set(&self) -> &Arc<PrioritySet> {
        &self.priority_set
    }

    pub fn settings(&self) -> Arc<ClusterSettings> {
        self.settings.load_full()
    }

    /// Bring the cluster in line with `cfg`.
    ///
    /// The whole config is validated before anything is touched. Tiers the
    /// config no longer lists are emptied.
    pub fn apply(&self, cfg: &ClusterConfig) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        validate_cluster(cfg, &mut errors);
        ConfigError::from_errors(errors)?;

        self.priority_set
            .set_overprovisioning_factor(cfg.load_balancer.overprovisioning_factor);
        self.settings.store(Arc::new(ClusterSettings {
            strategy: cfg.strategy,
            load_balancer: cfg.load_balancer.clone(),
        }));

        for (priority, tier) in cfg.priorities.iter().enumerate() {
            self.priority_set.update_hosts(
                priority as u32,
                tier.host_specs(),
                tier.locality_weight_map(),
            )?;
        }

        let existing = self.priority_set.snapshot().host_sets().len();
        for priority in cfg.priorities.len()..existing {
            self.priority_set
                .update_hosts(priority as u32, Vec::new(), Default::default())?;
        }

        tracing::debug!(
            cluster = %self.name,
            priorities = cfg.priorities.len(),
            generation = self.priority_set.generation(),
            "cluster applied"
        );

        Ok(())
    }

    /// A fresh load balancer for one worker. It follows later reloads of
    /// the cluster's settings.
    ///
    /// `local_cluster` is only consulted while the settings enable
    /// zone-aware routing.
    pub fn load_balancer(&self, local_cluster: Option<Arc<PrioritySet>>) -> LoadBalancer {
        let lb = LoadBalancer::shared(self.priority_set.clone(), self.settings.clone());

        match local_cluster {
            Some(local) => lb.with_local_cluster(local),
            None => lb,
        }
    }
}
