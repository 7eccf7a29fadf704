use crate::traffic::scheduler::EdfScheduler;
use crate::traffic::strategy::TrafficStrategy;
use crate::upstream::HostRef;
use rand::RngCore;

/// Weighted round robin over an EDF scheduler.
#[derive(Debug)]
pub struct RoundRobin {
    scheduler: EdfScheduler<HostRef>,
}

impl RoundRobin {
    pub fn new(hosts: &[HostRef]) -> Self {
        let mut scheduler = EdfScheduler::with_capacity(hosts.len());
        for host in hosts {
            scheduler.add(f64::from(host.weight()), host.clone());
        }
        Self { scheduler }
    }

    pub fn peek(&self) -> Option<&HostRef> {
        self.scheduler.peek()
    }
}

impl TrafficStrategy for RoundRobin {
    fn pick(&mut self, _rng: &mut dyn RngCore) -> Option<HostRef> {
        self.scheduler.pick()
    }
}
