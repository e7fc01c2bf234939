//! The shared job slot: the single piece of "current work" every transport
//! writes into and every worker reads from.

use std::sync::Mutex;

use miner_util::now_secs;

use crate::work::Work;

/// Holds the current work plus the wall-clock time it was installed, so
/// the fail-pause/"go stale" logic can tell how long a job has been live.
pub struct SharedJobSlot {
    inner: Mutex<(Work, u64)>,
}

impl SharedJobSlot {
    pub fn new(initial: Work) -> Self {
        SharedJobSlot {
            inner: Mutex::new((initial, now_secs())),
        }
    }

    /// Deep-copies the current work out of the slot.
    pub fn snapshot(&self) -> Work {
        self.inner
            .lock()
            .expect("job slot mutex poisoned")
            .0
            .clone()
    }

    /// Timestamp (unix seconds) the current work was installed.
    pub fn age_secs(&self) -> u64 {
        let (_, installed_at) = *self.inner.lock().expect("job slot mutex poisoned");
        now_secs().saturating_sub(installed_at)
    }

    /// Replaces the slot's contents. Callers are responsible for also
    /// calling `WorkRestart::restart_all` so workers notice.
    pub fn replace(&self, work: Work) {
        let mut guard = self.inner.lock().expect("job slot mutex poisoned");
        *guard = (work, now_secs());
    }

    /// Updates only the nonce-independent fields needed for ntime rolling
    /// without disturbing height/txs/workid bookkeeping, then re-stamps
    /// the install time.
    pub fn touch(&self) {
        let mut guard = self.inner.lock().expect("job slot mutex poisoned");
        guard.1 = now_secs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_independent_of_later_replace() {
        let mut work = Work::empty();
        work.set_nonce(1);
        let slot = SharedJobSlot::new(work);

        let snap = slot.snapshot();
        assert_eq!(snap.nonce(), 1);

        let mut next = Work::empty();
        next.set_nonce(2);
        slot.replace(next);

        assert_eq!(snap.nonce(), 1);
        assert_eq!(slot.snapshot().nonce(), 2);
    }
}
