use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    Random,
    LeastRequest,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoadBalancerConfig {
    /// Percentage by which healthy and degraded capacity is inflated when
    /// computing how available a tier or locality is.
    #[serde(default = "lb_default_overprovisioning_factor")]
    pub overprovisioning_factor: u32,

    /// Below this percentage of healthy + degraded hosts a pool is in panic.
    #[serde(default = "lb_default_healthy_panic_threshold")]
    pub healthy_panic_threshold: u32,

    /// When true, a tier in panic is never widened to its unhealthy hosts
    /// and a cluster with no available tier fails the request.
    #[serde(default = "lb_default_fail_traffic_on_panic")]
    pub fail_traffic_on_panic: bool,

    /// Pick a locality by its effective weight before picking a host.
    #[serde(default)]
    pub locality_weighted: bool,

    #[serde(default)]
    pub zone_aware: Option<ZoneAwareConfig>,

    /// Hosts sampled per pick by the least-request strategy.
    #[serde(default = "lb_default_least_request_choice_count")]
    pub least_request_choice_count: u32,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            overprovisioning_factor: lb_default_overprovisioning_factor(),
            healthy_panic_threshold: lb_default_healthy_panic_threshold(),
            fail_traffic_on_panic: lb_default_fail_traffic_on_panic(),
            locality_weighted: false,
            zone_aware: None,
            least_request_choice_count: lb_default_least_request_choice_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ZoneAwareConfig {
    #[serde(default = "za_default_enabled")]
    pub enabled: bool,

    /// Both the local cluster and the upstream tier need at least this many
    /// hosts before locality accounting is attempted.
    #[serde(default = "za_default_min_cluster_size")]
    pub min_cluster_size: u32,

    /// Share of requests for which zone-aware routing is attempted at all.
    #[serde(default = "za_default_routing_enabled_percent")]
    pub routing_enabled_percent: u32,
}

impl Default for ZoneAwareConfig {
    fn default() -> Self {
        Self {
            enabled: za_default_enabled(),
            min_cluster_size: za_default_min_cluster_size(),
            routing_enabled_percent: za_default_routing_enabled_percent(),
        }
    }
}

fn lb_default_overprovisioning_factor() -> u32 {
    140
}
fn lb_default_healthy_panic_threshold() -> u32 {
    50
}
fn lb_default_fail_traffic_on_panic() -> bool {
    true
}
fn lb_default_least_request_choice_count() -> u32 {
    2
}

fn za_default_enabled() -> bool {
    true
}
fn za_default_min_cluster_size() -> u32 {
    6
}
fn za_default_routing_enabled_percent() -> u32 {
    100
}
