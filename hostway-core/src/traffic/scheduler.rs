use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Earliest-deadline-first weighted scheduler.
///
/// Every entry carries a deadline; a pick pops the earliest one and puts it
/// back `1 / weight` later. Over a long run each entry is picked in
/// proportion to its weight and consecutive picks of the same entry are
/// spread out as evenly as the other weights allow. Equal deadlines are
/// resolved in insertion order, so equal weights give plain round robin.
///
/// With integer weights summing to `W` over `n` entries, an entry of weight
/// `w` is picked exactly `k * w` times in the first `k * W` picks. After any
/// other number of picks `N` its count stays within
/// `[N * w / W - 1, N * w / W + n * w / W]`.
///
/// The scheduler keeps no link to where its entries came from; it must be
/// rebuilt from scratch whenever the pool or any weight changes.
#[derive(Debug, Clone)]
pub struct EdfScheduler<T> {
    queue: BinaryHeap<Entry<T>>,
    current_time: f64,
    order_offset: u64,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    deadline: f64,
    order: u64,
    weight: f64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap; reverse so the earliest deadline is on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .total_cmp(&self.deadline)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl<T: Clone> Default for EdfScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EdfScheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            current_time: 0.0,
            order_offset: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: BinaryHeap::with_capacity(capacity),
            current_time: 0.0,
            order_offset: 0,
        }
    }

    /// Entries with a weight that is not strictly positive are ignored.
    pub fn add(&mut self, weight: f64, item: T) {
        if weight.is_nan() || weight <= 0.0 {
            return;
        }

        let deadline = self.current_time + 1.0 / weight;
        self.queue.push(Entry {
            deadline,
            order: self.order_offset,
            weight,
            item,
        });
        self.order_offset += 1;
    }

    /// Pick the next entry and reschedule it with its current weight.
    pub fn pick(&mut self) -> Option<T> {
        self.pick_with(|_, weight| weight)
    }

    /// Pick the next entry and reschedule it with the weight returned by
    /// `next_weight`, which receives the item and its previous weight.
    pub fn pick_with(&mut self, next_weight: impl FnOnce(&T, f64) -> f64) -> Option<T> {
        let entry = self.queue.pop()?;
        self.current_time = entry.deadline;

        let weight = next_weight(&entry.item, entry.weight);
        let item = entry.item.clone();
        if weight.is_nan() || weight <= 0.0 {
            // Keep the entry eligible with its previous weight.
            self.add(entry.weight, entry.item);
        } else {
            self.add(weight, entry.item);
        }
        Some(item)
    }

    /// The entry the next pick would return.
    pub fn peek(&self) -> Option<&T> {
        self.queue.peek().map(|e| &e.item)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
