use crate::conf::types::{LoadBalancerConfig, LoadBalancingStrategy};
use crate::upstream::{Health, HostSpec, Locality};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level contents of a clusters file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClustersConfig {
    /// Cluster describing this proxy fleet; required for zone-aware routing.
    #[serde(default)]
    pub local_cluster: Option<String>,

    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClusterConfig {
    pub name: String,

    #[serde(default)]
    pub strategy: LoadBalancingStrategy,

    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,

    /// Index in this list is the priority.
    #[serde(default)]
    pub priorities: Vec<PriorityConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PriorityConfig {
    #[serde(default)]
    pub locality_weights: Vec<LocalityWeightConfig>,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl PriorityConfig {
    pub fn host_specs(&self) -> Vec<HostSpec> {
        self.endpoints.iter().map(EndpointConfig::host_spec).collect()
    }

    pub fn locality_weight_map(&self) -> HashMap<Locality, u32> {
        self.locality_weights
            .iter()
            .map(|lw| (lw.locality(), lw.weight))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LocalityWeightConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub sub_zone: String,
    pub weight: u32,
}

impl LocalityWeightConfig {
    pub fn locality(&self) -> Locality {
        Locality::new(&self.region, &self.zone, &self.sub_zone)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// e.g. "10.0.0.1:8080"
    pub address: String,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub sub_zone: String,

    /// Health reported by discovery; unset keeps whatever the health
    /// checker last decided.
    #[serde(default)]
    pub health: Option<Health>,

    #[serde(default)]
    pub excluded: Option<bool>,
}

impl EndpointConfig {
    pub fn locality(&self) -> Locality {
        Locality::new(&self.region, &self.zone, &self.sub_zone)
    }

    pub fn host_spec(&self) -> HostSpec {
        HostSpec {
            address: self.address.clone(),
            weight: self.weight,
            locality: self.locality(),
            health: self.health,
            excluded: self.excluded,
        }
    }
}

fn default_weight() -> u32 {
    1
}
