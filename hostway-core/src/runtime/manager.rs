use crate::conf::types::{ClusterConfig, ClustersConfig};
use crate::conf::{ConfigError, load_clusters, validate_clusters};
use crate::runtime::cluster::Cluster;
use crate::traffic::LoadBalancer;
use ahash::AHashSet;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// What a reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

/// Registry of every cluster this proxy balances over.
///
/// Clusters survive reloads: one that is still configured keeps its
/// priority set and hosts, so workers' load balancers stay valid.
#[derive(Debug, Default)]
pub struct ClusterManager {
    clusters: DashMap<String, Arc<Cluster>>,
    local_cluster: ArcSwapOption<String>,
}

impl ClusterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.get(name).map(|c| c.value().clone())
    }

    /// Sorted cluster names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The cluster describing this proxy's own fleet, if configured.
    pub fn local_cluster(&self) -> Option<Arc<Cluster>> {
        let name = self.local_cluster.load_full()?;
        self.get(&name)
    }

    pub fn set_local_cluster(&self, name: Option<String>) {
        self.local_cluster.store(name.map(Arc::new));
    }

    /// Create the cluster or update the existing one in place.
    pub fn add_or_update(&self, cfg: &ClusterConfig) -> Result<Arc<Cluster>, ConfigError> {
        if let Some(existing) = self.get(&cfg.name) {
            existing.apply(cfg)?;
            return Ok(existing);
        }

        let cluster = Arc::new(Cluster::from_config(cfg)?);
        self.clusters.insert(cfg.name.clone(), cluster.clone());
        tracing::info!(cluster = %cfg.name, "cluster added");
        Ok(cluster)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Cluster>> {
        let (_, cluster) = self.clusters.remove(name)?;
        tracing::info!(cluster = %name, "cluster removed");
        Some(cluster)
    }

    /// A load balancer for one worker, wired to the local cluster when the
    /// target cluster is zone-aware.
    pub fn load_balancer(&self, name: &str) -> Option<LoadBalancer> {
        let cluster = self.get(name)?;
        let local = self.local_cluster().map(|c| c.priority_set().clone());
        Some(cluster.load_balancer(local))
    }

    /// Make the registry match `cfg`.
    ///
    /// Everything is validated before any cluster changes; an invalid config
    /// leaves the registry as it was.
    pub fn reload(&self, cfg: &ClustersConfig) -> Result<ReloadSummary, ConfigError> {
        validate_clusters(cfg)?;

        let mut summary = ReloadSummary::default();
        let mut wanted = AHashSet::with_capacity(cfg.clusters.len());

        for cluster in &cfg.clusters {
            wanted.insert(cluster.name.as_str());
            if self.clusters.contains_key(&cluster.name) {
                summary.updated.push(cluster.name.clone());
            } else {
                summary.added.push(cluster.name.clone());
            }
            self.add_or_update(cluster)?;
        }

        for name in self.names() {
            if !wanted.contains(name.as_str()) {
                self.remove(&name);
                summary.removed.push(name);
            }
        }

        self.set_local_cluster(cfg.local_cluster.clone());

        tracing::info!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            removed = summary.removed.len(),
            "clusters reloaded"
        );

        Ok(summary)
    }

    pub fn reload_from_path(&self, path: &Path) -> anyhow::Result<ReloadSummary> {
        let cfg = load_clusters(path)?;
        let summary = self.reload(&cfg)?;
        Ok(summary)
    }
}
