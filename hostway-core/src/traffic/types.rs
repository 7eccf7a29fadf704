use crate::conf::types::{LoadBalancerConfig, LoadBalancingStrategy};
use crate::upstream::Locality;
use rand::RngCore;
use std::fmt;
use thiserror::Error;

/// Returned when no tier has a host to offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("no healthy upstream")]
pub struct NoHealthyUpstream;

/// How a cluster is balanced. Swapped as a whole on reload; load balancers
/// sharing it pick the new value up on their next pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSettings {
    pub strategy: LoadBalancingStrategy,
    pub load_balancer: LoadBalancerConfig,
}

/// Per-request inputs to host selection.
#[derive(Default)]
pub struct LoadBalancerContext<'a> {
    local_locality: Option<&'a Locality>,
    hash_key: Option<u64>,
    random: Option<&'a mut dyn RngCore>,
}

impl fmt::Debug for LoadBalancerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancerContext")
            .field("local_locality", &self.local_locality)
            .field("hash_key", &self.hash_key)
            .field("random", &self.random.is_some())
            .finish()
    }
}

impl<'a> LoadBalancerContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locality of the proxy handling the request. Needed for zone-aware
    /// routing.
    pub fn with_local_locality(mut self, locality: &'a Locality) -> Self {
        self.local_locality = Some(locality);
        self
    }

    /// Carried for hash-based selectors; ignored by the ones in this crate.
    pub fn with_hash_key(mut self, key: u64) -> Self {
        self.hash_key = Some(key);
        self
    }

    /// Draw from `rng` instead of the load balancer's own generator.
    pub fn with_random(mut self, rng: &'a mut dyn RngCore) -> Self {
        self.random = Some(rng);
        self
    }

    pub fn local_locality(&self) -> Option<&'a Locality> {
        self.local_locality
    }

    pub fn hash_key(&self) -> Option<u64> {
        self.hash_key
    }

    pub(crate) fn random(&mut self) -> Option<&mut (dyn RngCore + 'a)> {
        self.random.as_deref_mut()
    }
}
