use crate::traffic::scheduler::EdfScheduler;
use crate::traffic::strategy::TrafficStrategy;
use crate::upstream::HostRef;
use rand::{Rng, RngCore};

/// Prefers hosts with fewer requests in flight.
///
/// With equal weights this samples `choice_count` hosts at random and keeps
/// the least loaded one. With unequal weights it runs an EDF schedule whose
/// weights are `weight / (active + 1)`, recomputed on every pick.
#[derive(Debug)]
pub struct LeastRequest {
    hosts: Vec<HostRef>,
    choice_count: u32,
    scheduler: Option<EdfScheduler<HostRef>>,
}

impl LeastRequest {
    pub fn new(hosts: &[HostRef], choice_count: u32) -> Self {
        let weighted = hosts.windows(2).any(|w| w[0].weight() != w[1].weight());

        let scheduler = weighted.then(|| {
            let mut scheduler = EdfScheduler::with_capacity(hosts.len());
            for host in hosts {
                scheduler.add(dynamic_weight(host), host.clone());
            }
            scheduler
        });

        Self {
            hosts: hosts.to_vec(),
            choice_count: choice_count.max(1),
            scheduler,
        }
    }
}

fn dynamic_weight(host: &HostRef) -> f64 {
    f64::from(host.weight()) / (f64::from(host.active_requests()) + 1.0)
}

impl TrafficStrategy for LeastRequest {
    fn pick(&mut self, rng: &mut dyn RngCore) -> Option<HostRef> {
        if let Some(scheduler) = &mut self.scheduler {
            return scheduler.pick_with(|host, _| dynamic_weight(host));
        }

        if self.hosts.is_empty() {
            return None;
        }

        let mut best: Option<&HostRef> = None;
        for _ in 0..self.choice_count {
            let candidate = &self.hosts[rng.random_range(0..self.hosts.len())];
            match best {
                Some(b) if b.active_requests() <= candidate.active_requests() => {}
                _ => best = Some(candidate),
            }
        }
        best.cloned()
    }
}
