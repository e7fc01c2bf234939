//! Pure function: GetBlockTemplate JSON → 80-byte header + transaction
//! list + target. No network I/O lives here; `rpcclient` calls in and
//! `assemble` hands back a `Work` ready to drop into the shared job slot.

pub mod coinbase;
pub mod gbt;
pub mod getwork;
pub mod merkle;
pub mod script;

pub use gbt::{assemble, AssembledWork, GbtError};
