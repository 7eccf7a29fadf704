use crate::traffic::strategy::TrafficStrategy;
use crate::upstream::HostRef;
use rand::{Rng, RngCore};

/// Weighted random draw over a cumulative weight table.
///
/// The table is derived once per pool; each pick is a binary search and
/// keeps no history between calls.
#[derive(Debug)]
pub struct Random {
    hosts: Vec<HostRef>,
    cumulative: Vec<u64>,
    total: u64,
}

impl Random {
    pub fn new(hosts: &[HostRef]) -> Self {
        let mut total = 0u64;
        let cumulative = hosts
            .iter()
            .map(|h| {
                total += u64::from(h.weight());
                total
            })
            .collect();

        Self {
            hosts: hosts.to_vec(),
            cumulative,
            total,
        }
    }

    /// Host owning `point` in `[0, total)`.
    pub fn host_at(&self, point: u64) -> Option<&HostRef> {
        let idx = self.cumulative.partition_point(|&c| c <= point);
        self.hosts.get(idx)
    }

    pub fn total_weight(&self) -> u64 {
        self.total
    }
}

impl TrafficStrategy for Random {
    fn pick(&mut self, rng: &mut dyn RngCore) -> Option<HostRef> {
        if self.total == 0 {
            return None;
        }

        let point = rng.random_range(0..self.total);
        self.host_at(point).cloned()
    }

    fn skip(&mut self, _picks: usize, _rng: &mut dyn RngCore) {}
}
