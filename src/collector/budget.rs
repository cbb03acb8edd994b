use std::sync::atomic::{AtomicUsize, Ordering};

/// Global item budget of one collection session.
///
/// A monotonic counter with a bounded `claim`: every accepted item
/// claims one slot right before it is emitted, and a claim beyond
/// the limit is refused. The counter never exceeds the limit.
///
/// Shared by reference (`Arc`) when connectors run concurrently.
#[derive(Debug)]
pub struct Budget {
    limit: usize,
    claimed: AtomicUsize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            claimed: AtomicUsize::new(0),
        }
    }

    /// Claims one slot. Returns whether the slot is within budget.
    pub fn claim(&self) -> bool {
        self.claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.claimed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.claimed() >= self.limit
    }
}
