//! The worker thread body (§4.3): outer refresh/partition bookkeeping
//! wrapped around the inner hash scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use miner_core::{restart::WorkRestart, slot::SharedJobSlot, work::Work};
use miner_hash::{Algorithm, ScryptScratch};

use crate::partition::partition_bounds;
use crate::stats::HashrateTracker;

/// Shared handles every worker thread needs. Kept free of any transport
/// (rpcclient/stratum) dependency — the binary wires `request_work` and
/// `submit_solution` up to whichever transport is active.
pub struct WorkerHandles {
    pub slot: Arc<SharedJobSlot>,
    pub restart: Arc<WorkRestart>,
    pub stats: Arc<HashrateTracker>,
    pub running: Arc<AtomicBool>,
    pub request_work: Arc<dyn Fn() + Send + Sync>,
    pub submit_solution: Arc<dyn Fn(Work) + Send + Sync>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerParams {
    pub index: usize,
    pub num_workers: usize,
    pub algorithm: Algorithm,
    pub stratum_mode: bool,
    pub scantime_secs: u32,
    pub worker_index_in_core: usize,
    pub affine_to_cpu: bool,
}

const STRATUM_STALE_SECS: u64 = 120;
const OUTER_IDLE_SLEEP: Duration = Duration::from_millis(500);

/// Runs the outer scan loop until `handles.running` is cleared. Intended
/// to be the body of its own `std::thread`.
pub fn run(params: WorkerParams, handles: WorkerHandles) {
    if params.affine_to_cpu {
        miner_util::affine_to_cpu(params.worker_index_in_core, params.num_workers);
    }

    let (partition_start, partition_end) = partition_bounds(params.num_workers, params.index);
    let scratch = match params.algorithm {
        Algorithm::Scrypt { n } => {
            Some(ScryptScratch::new(n).expect("algorithm was already validated at startup"))
        }
        Algorithm::Sha256d => None,
    };

    let mut private: Option<Work> = None;
    let mut nonce = partition_start;

    while handles.running.load(Ordering::Relaxed) {
        let age = handles.slot.age_secs();

        if params.stratum_mode {
            if age > STRATUM_STALE_SECS {
                std::thread::sleep(OUTER_IDLE_SLEEP);
                continue;
            }
        } else {
            let exhausted = private.is_none() || nonce >= partition_end;
            if age as u32 >= params.scantime_secs || exhausted {
                (handles.request_work)();
            }
        }

        let snapshot = handles.slot.snapshot();
        let is_new_job = match &private {
            Some(p) => p.prefix19() != snapshot.prefix19(),
            None => true,
        };

        let mut work = if is_new_job {
            nonce = partition_start;
            snapshot
        } else {
            nonce = nonce.wrapping_add(1);
            private.take().expect("private copy exists when job is unchanged")
        };

        handles.restart.clear(params.index);

        if nonce >= partition_end {
            private = Some(work);
            std::thread::sleep(OUTER_IDLE_SLEEP);
            continue;
        }

        let hashrate = handles.stats.rate(params.index);
        let remaining_scantime = if params.stratum_mode {
            0.0
        } else {
            (params.scantime_secs as f64 - age as f64).max(0.0)
        };
        let span = if remaining_scantime > 0.0 && hashrate > 0.0 {
            (hashrate * remaining_scantime) as u64
        } else {
            params.algorithm.default_nonce_span() as u64
        };
        let max_nonce = nonce
            .saturating_add(span.min(u32::MAX as u64) as u32)
            .min(partition_end.saturating_sub(1));

        let start = Instant::now();
        let (found, last_nonce, hashes_tried) =
            scan(&mut work, nonce, max_nonce, params.algorithm, scratch.as_ref(), &handles.restart, params.index);
        let elapsed = start.elapsed().as_secs_f64();
        handles.stats.update(params.index, hashes_tried, elapsed);

        nonce = last_nonce;

        if found {
            info!("worker {} found a candidate at nonce {:08x}", params.index, work.nonce());
            (handles.submit_solution)(work.clone());
        }

        private = Some(work);
    }

    debug!("worker {} stopping", params.index);
}

/// Scans nonces `[start, max_nonce]` inclusive, stopping early on a hit or
/// a restart signal. Returns `(found, last_nonce_examined, hashes_tried)`.
fn scan(
    work: &mut Work,
    start: u32,
    max_nonce: u32,
    algorithm: Algorithm,
    scratch: Option<&ScryptScratch>,
    restart: &WorkRestart,
    worker_index: usize,
) -> (bool, u32, u64) {
    let mut n = start;
    let mut hashes_tried = 0u64;

    loop {
        if restart.should_restart(worker_index) {
            return (false, n, hashes_tried);
        }

        work.set_nonce(n);
        let header = work.header_bytes();
        let digest = miner_hash::pow_hash(algorithm, &header, scratch);
        hashes_tried += 1;

        if miner_hash::hash_meets_target(&digest, &work.target) {
            return (true, n, hashes_tried);
        }

        if n == max_nonce {
            return (false, n, hashes_tried);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miner_core::target::target_from_difficulty;

    #[test]
    fn scan_stops_at_max_nonce_when_no_hit() {
        let target = [0u32; 8]; // impossible to beat
        let mut work = Work::from_header_fields(1, [0; 32], [0; 32], 1, 0x1d00ffff, target);
        let restart = WorkRestart::new(1);
        let (found, last, tried) = scan(&mut work, 0, 9, Algorithm::Sha256d, None, &restart, 0);
        assert!(!found);
        assert_eq!(last, 9);
        assert_eq!(tried, 10);
    }

    #[test]
    fn scan_honors_restart_flag() {
        let target = [0u32; 8];
        let mut work = Work::from_header_fields(1, [0; 32], [0; 32], 1, 0x1d00ffff, target);
        let restart = WorkRestart::new(1);
        restart.restart_all();
        let (found, _last, tried) = scan(&mut work, 0, 1000, Algorithm::Sha256d, None, &restart, 0);
        assert!(!found);
        assert_eq!(tried, 0);
    }

    #[test]
    fn scan_finds_a_trivially_easy_target() {
        // difficulty 1 target is large enough that nonce 0 almost certainly
        // is not a hit for an arbitrary header, so scan a small range and
        // just assert it terminates and counts correctly when unsuccessful,
        // mirroring the no-hit test but with a realistic target magnitude.
        let target = target_from_difficulty(1.0, false);
        let mut work = Work::from_header_fields(1, [0; 32], [0; 32], 1, 0x1d00ffff, target);
        let restart = WorkRestart::new(1);
        let (_found, _last, tried) = scan(&mut work, 0, 99, Algorithm::Sha256d, None, &restart, 0);
        assert_eq!(tried, 100);
    }
}
