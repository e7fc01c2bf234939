//! Stratum v1 client: subscribe, authorize, then translate
//! `mining.notify`/`mining.set_difficulty` into `Work` and route solved
//! shares back out through the same socket.

pub mod client;
pub mod context;
pub mod error;
pub mod job;
pub mod protocol;

pub use client::{run, ShareSubmission, StratumHandle};
pub use context::StratumContext;
pub use error::StratumError;
pub use job::{build_work, JobHandle};
