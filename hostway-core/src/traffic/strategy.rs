use crate::conf::types::LoadBalancingStrategy;
use crate::traffic::algorithms::{LeastRequest, Random, RoundRobin};
use crate::upstream::HostRef;
use rand::RngCore;

/// Picks hosts from one fixed pool.
///
/// Built over a single snapshot's host list and thrown away when that
/// snapshot is replaced.
pub trait TrafficStrategy: Send {
    fn pick(&mut self, rng: &mut dyn RngCore) -> Option<HostRef>;

    /// Move past `picks` selections without handing them out.
    fn skip(&mut self, picks: usize, rng: &mut dyn RngCore) {
        for _ in 0..picks {
            self.pick(rng);
        }
    }
}

pub fn build_strategy(
    strategy: LoadBalancingStrategy,
    hosts: &[HostRef],
    least_request_choice_count: u32,
) -> Box<dyn TrafficStrategy> {
    match strategy {
        LoadBalancingStrategy::RoundRobin => Box::new(RoundRobin::new(hosts)),
        LoadBalancingStrategy::Random => Box::new(Random::new(hosts)),
        LoadBalancingStrategy::LeastRequest => {
            Box::new(LeastRequest::new(hosts, least_request_choice_count))
        }
    }
}
