//! Per-thread hashrate tracking behind one lock, the way the teacher's
//! stats struct guards its counters — writes are rare (once per outer
//! iteration), reads are for logging/reporting only.

use std::sync::Mutex;

pub struct HashrateTracker {
    rates: Mutex<Vec<f64>>,
}

impl HashrateTracker {
    pub fn new(num_workers: usize) -> Self {
        HashrateTracker {
            rates: Mutex::new(vec![0.0; num_workers]),
        }
    }

    pub fn update(&self, index: usize, hashes: u64, elapsed_secs: f64) {
        let rate = if elapsed_secs > 0.0 {
            hashes as f64 / elapsed_secs
        } else {
            0.0
        };
        self.rates.lock().expect("hashrate mutex poisoned")[index] = rate;
    }

    pub fn rate(&self, index: usize) -> f64 {
        self.rates.lock().expect("hashrate mutex poisoned")[index]
    }

    pub fn total(&self) -> f64 {
        self.rates.lock().expect("hashrate mutex poisoned").iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_every_worker() {
        let tracker = HashrateTracker::new(3);
        tracker.update(0, 1000, 1.0);
        tracker.update(1, 2000, 1.0);
        tracker.update(2, 3000, 1.0);
        assert_eq!(tracker.total(), 6000.0);
    }

    #[test]
    fn zero_elapsed_time_yields_zero_rate_not_a_panic() {
        let tracker = HashrateTracker::new(1);
        tracker.update(0, 500, 0.0);
        assert_eq!(tracker.rate(0), 0.0);
    }
}
