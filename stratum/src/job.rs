//! Merges a cached `mining.notify` job with the running extranonce2
//! counter into mineable `Work` (§4.2).

use miner_core::{target::target_from_difficulty, work::Work};
use miner_hash::sha256d;

use crate::context::{increment_le, StratumContext};

/// The extranonce2 value and job id used to build a given `Work`, so a
/// found share can be submitted against the exact job/counter pair that
/// produced it.
pub struct JobHandle {
    pub job_id: String,
    pub xnonce2: Vec<u8>,
}

/// Builds the next `Work` item from the cached job, then advances the
/// extranonce2 counter so the following call gets a fresh one.
pub fn build_work(ctx: &StratumContext, is_scrypt: bool) -> Option<(Work, JobHandle)> {
    ctx.with_locked(|job, xnonce1, xnonce2, difficulty| {
        let coinbase: Vec<u8> = job
            .coinb1
            .iter()
            .chain(xnonce1.iter())
            .chain(xnonce2.iter())
            .chain(job.coinb2.iter())
            .copied()
            .collect();

        let mut merkle_root = sha256d(&coinbase);
        for branch_hash in &job.merkle_branch {
            let mut buf = Vec::with_capacity(64);
            buf.extend_from_slice(&merkle_root);
            buf.extend_from_slice(branch_hash);
            merkle_root = sha256d(&buf);
        }

        let target = target_from_difficulty(difficulty, is_scrypt);
        let mut work = Work::from_header_fields(
            job.version,
            job.prev_hash_wire,
            merkle_root,
            job.ntime,
            job.nbits,
            target,
        );
        work.job_id = Some(job.job_id.clone());
        work.xnonce2 = xnonce2.clone();

        let handle = JobHandle {
            job_id: job.job_id.clone(),
            xnonce2: xnonce2.clone(),
        };

        increment_le(xnonce2);

        (work, handle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NotifyJob;

    fn sample_job() -> NotifyJob {
        NotifyJob {
            job_id: "1".to_string(),
            prev_hash_wire: [0u8; 32],
            coinb1: vec![0xaa, 0xbb],
            coinb2: vec![0xcc, 0xdd],
            merkle_branch: vec![[0x11u8; 32], [0x22u8; 32]],
            version: 1,
            nbits: 0x1d00ffff,
            ntime: 1_700_000_000,
            clean_jobs: true,
        }
    }

    #[test]
    fn build_work_advances_xnonce2_after_use() {
        let ctx = StratumContext::new();
        ctx.set_subscription(vec![0x01, 0x02], 4);
        ctx.set_job(sample_job());
        ctx.set_difficulty(1.0);

        let (_, handle1) = build_work(&ctx, false).expect("job should be present");
        assert_eq!(handle1.xnonce2, vec![0, 0, 0, 0]);

        let (_, handle2) = build_work(&ctx, false).expect("job should be present");
        assert_eq!(handle2.xnonce2, vec![1, 0, 0, 0]);
    }

    #[test]
    fn build_work_returns_none_without_a_job() {
        let ctx = StratumContext::new();
        assert!(build_work(&ctx, false).is_none());
    }

    #[test]
    fn merkle_branch_folds_in_order() {
        let ctx = StratumContext::new();
        ctx.set_subscription(vec![], 4);
        ctx.set_job(sample_job());
        ctx.set_difficulty(1.0);

        let coinbase = [0xaa, 0xbb, 0, 0, 0, 0, 0xcc, 0xdd];
        let mut expected = sha256d(&coinbase);
        for branch in [[0x11u8; 32], [0x22u8; 32]] {
            let mut buf = Vec::new();
            buf.extend_from_slice(&expected);
            buf.extend_from_slice(&branch);
            expected = sha256d(&buf);
        }

        let (work, _) = build_work(&ctx, false).expect("job should be present");
        let expected_words: Vec<u32> = expected
            .chunks(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(&work.data[9..17], expected_words.as_slice());
    }
}
