//! Cached `mining.notify` state plus the extranonce2 counter, guarded by
//! one work lock — the critical section §4.2's work-generation algorithm
//! runs under.

use std::sync::Mutex;

use crate::protocol::NotifyJob;

pub struct StratumContext {
    inner: Mutex<Inner>,
}

struct Inner {
    xnonce1: Vec<u8>,
    xnonce2_size: usize,
    xnonce2: Vec<u8>,
    job: Option<NotifyJob>,
    difficulty: f64,
}

impl StratumContext {
    pub fn new() -> Self {
        StratumContext {
            inner: Mutex::new(Inner {
                xnonce1: Vec::new(),
                xnonce2_size: 4,
                xnonce2: vec![0u8; 4],
                job: None,
                difficulty: 1.0,
            }),
        }
    }

    pub fn set_subscription(&self, xnonce1: Vec<u8>, xnonce2_size: usize) {
        let mut inner = self.inner.lock().expect("stratum context mutex poisoned");
        inner.xnonce1 = xnonce1;
        inner.xnonce2_size = xnonce2_size;
        inner.xnonce2 = vec![0u8; xnonce2_size];
    }

    pub fn set_difficulty(&self, difficulty: f64) {
        self.inner.lock().expect("stratum context mutex poisoned").difficulty = difficulty;
    }

    pub fn set_job(&self, job: NotifyJob) {
        self.inner.lock().expect("stratum context mutex poisoned").job = Some(job);
    }

    pub fn clean_jobs_pending(&self) -> bool {
        self.inner
            .lock()
            .expect("stratum context mutex poisoned")
            .job
            .as_ref()
            .map(|j| j.clean_jobs)
            .unwrap_or(false)
    }

    /// Runs the closure with exclusive access to the cached job,
    /// extranonce1, and the running xnonce2 counter — the "under the
    /// Stratum work lock" section of §4.2.
    pub fn with_locked<R>(&self, f: impl FnOnce(&NotifyJob, &[u8], &mut Vec<u8>, f64) -> R) -> Option<R> {
        let mut inner = self.inner.lock().expect("stratum context mutex poisoned");
        let Inner {
            xnonce1,
            xnonce2,
            job,
            difficulty,
            ..
        } = &mut *inner;
        let job = job.as_ref()?;
        Some(f(job, xnonce1, xnonce2, *difficulty))
    }
}

impl Default for StratumContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Increments a little-endian byte counter by one, rippling the carry
/// across bytes (§4.2 step 4 / invariant 5).
pub fn increment_le(counter: &mut [u8]) {
    for byte in counter.iter_mut() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_ripples_carry_across_bytes() {
        let mut counter = vec![0xff, 0xff, 0x00, 0x00];
        increment_le(&mut counter);
        assert_eq!(counter, vec![0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn increment_is_exactly_one() {
        let mut counter = vec![0x05, 0x00];
        increment_le(&mut counter);
        assert_eq!(counter, vec![0x06, 0x00]);
    }
}
