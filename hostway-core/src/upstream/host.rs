use crate::upstream::types::{Health, Locality};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

pub type HostRef = Arc<Host>;

const HEALTH_MASK: u8 = 0b0000_0011;
const EXCLUDED_BIT: u8 = 0b1000_0000;

/// One upstream endpoint.
///
/// Address, weight, locality and priority never change after construction.
/// The status cell (health + excluded flag) is a single atomic byte so the
/// hot path can read it without locking and without ever seeing half of an
/// update.
#[derive(Debug)]
pub struct Host {
    address: String,
    weight: u32,
    locality: Locality,
    priority: u32,
    status: AtomicU8,
    active_requests: AtomicU32,
}

impl Host {
    /// A weight of zero is clamped to 1.
    pub fn new(address: impl Into<String>, weight: u32, locality: Locality, priority: u32) -> Self {
        Self::with_status(address, weight, locality, priority, Health::Healthy, false)
    }

    pub(crate) fn with_status(
        address: impl Into<String>,
        weight: u32,
        locality: Locality,
        priority: u32,
        health: Health,
        excluded: bool,
    ) -> Self {
        let address = address.into();
        let weight = clamp_weight(&address, weight);

        Self {
            address,
            weight,
            locality,
            priority,
            status: AtomicU8::new(encode(health, excluded)),
            active_requests: AtomicU32::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn locality(&self) -> &Locality {
        &self.locality
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn health(&self) -> Health {
        self.status().0
    }

    pub fn is_excluded(&self) -> bool {
        self.status().1
    }

    /// Health and excluded flag read together from one load.
    pub(crate) fn status(&self) -> (Health, bool) {
        decode(self.status.load(Ordering::Acquire))
    }

    /// Returns true when the health actually changed.
    ///
    /// Only the cell is updated here; the owning host set keeps serving the
    /// views it derived earlier until `PrioritySet::refresh_health` (or
    /// `PrioritySet::set_health`) republishes it.
    pub fn set_health(&self, health: Health) -> bool {
        let prev = self.swap_bits(|s| (s & !HEALTH_MASK) | health as u8);
        decode(prev).0 != health
    }

    /// Returns true when the flag actually changed.
    pub fn set_excluded(&self, excluded: bool) -> bool {
        let prev = self.swap_bits(|s| {
            if excluded {
                s | EXCLUDED_BIT
            } else {
                s & !EXCLUDED_BIT
            }
        });
        decode(prev).1 != excluded
    }

    pub fn active_requests(&self) -> u32 {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_active_requests(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_active_requests(&self) {
        // Never wrap below zero.
        let _ = self
            .active_requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn swap_bits(&self, f: impl Fn(u8) -> u8) -> u8 {
        match self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| Some(f(s)))
        {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

fn clamp_weight(address: &str, weight: u32) -> u32 {
    if weight == 0 {
        tracing::warn!(address, "host weight of 0 clamped to 1");
        1
    } else {
        weight
    }
}

fn encode(health: Health, excluded: bool) -> u8 {
    let bits = health as u8;
    if excluded { bits | EXCLUDED_BIT } else { bits }
}

fn decode(bits: u8) -> (Health, bool) {
    (
        Health::from_bits(bits & HEALTH_MASK),
        bits & EXCLUDED_BIT != 0,
    )
}
