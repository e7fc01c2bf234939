//! Per-worker restart signalling.
//!
//! Every time the shared job slot is replaced with new work, every
//! worker's flag is set; each worker clears its own flag at the top of its
//! next outer scan iteration. A worker never clears another worker's flag.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct WorkRestart {
    flags: Vec<AtomicBool>,
}

impl WorkRestart {
    pub fn new(num_workers: usize) -> Self {
        let mut flags = Vec::with_capacity(num_workers);
        flags.resize_with(num_workers, || AtomicBool::new(false));
        WorkRestart { flags }
    }

    /// Signals every worker to abandon its current scan and fetch fresh
    /// work. Called whenever the shared job slot is replaced.
    pub fn restart_all(&self) {
        for flag in &self.flags {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// True if worker `index` has been asked to restart.
    pub fn should_restart(&self, index: usize) -> bool {
        self.flags[index].load(Ordering::SeqCst)
    }

    /// Clears worker `index`'s own flag — called at the start of each
    /// outer scan iteration, never on another worker's behalf.
    pub fn clear(&self, index: usize) {
        self.flags[index].store(false, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_all_sets_every_flag_independently() {
        let restart = WorkRestart::new(3);
        assert!(!restart.should_restart(0));
        restart.restart_all();
        assert!(restart.should_restart(0));
        assert!(restart.should_restart(1));
        assert!(restart.should_restart(2));

        restart.clear(1);
        assert!(restart.should_restart(0));
        assert!(!restart.should_restart(1));
        assert!(restart.should_restart(2));
    }
}
