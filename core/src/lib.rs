//! The shared work/job data model: the 80-byte header laid out as 32-bit
//! words, the shared job slot every worker reads from, the per-worker
//! restart flags, and target/difficulty conversions.
//!
//! This crate owns no I/O and no protocol knowledge — it's the in-memory
//! contract between the transports (GBT/GetWork/Stratum) that produce
//! work and the worker threads that consume it.

use thiserror::Error;

pub mod config;
pub mod counters;
pub mod restart;
pub mod slot;
pub mod target;
pub mod work;

pub use config::Config;
pub use counters::ShareCounters;
pub use miner_hash::Algorithm;
pub use restart::WorkRestart;
pub use slot::SharedJobSlot;
pub use target::{nbits_to_target, target_from_difficulty};
pub use work::Work;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("hash error: {0}")]
    Hash(#[from] miner_hash::HashError),

    #[error("util error: {0}")]
    Util(#[from] miner_util::UtilError),

    #[error("malformed work: {0}")]
    MalformedWork(String),
}
