//! Share accounting: a running accepted/rejected tally, the way the
//! original tool's `share_result()` prints a running total after every
//! submission.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ShareCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl ShareCounters {
    pub fn new() -> Self {
        ShareCounters::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_accepted_and_rejected_independently() {
        let counters = ShareCounters::new();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_rejected();
        assert_eq!(counters.accepted(), 2);
        assert_eq!(counters.rejected(), 1);
    }
}
