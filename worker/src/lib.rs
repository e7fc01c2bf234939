//! Partitions the 32-bit nonce space across worker threads and runs the
//! per-thread outer/inner scan loop (§4.3). Knows nothing about how work
//! arrives or where solutions go — those are handles the binary wires up.

pub mod loop_;
pub mod partition;
pub mod stats;

pub use loop_::{run, WorkerHandles, WorkerParams};
pub use partition::partition_bounds;
pub use stats::HashrateTracker;
