//! The JSON-RPC HTTP work source: the Work I/O task (protocol-fallback
//! GBT/GetWork requests and submissions) and the long-poll task. Both sit
//! behind the same shared job slot the Stratum client also writes into.

pub mod error;
pub mod jsonrpc;
pub mod longpoll;
pub mod workio;

pub use error::RpcError;
pub use jsonrpc::{RpcClient, RpcOutcome};
pub use workio::{WorkCommand, WorkIoHandle};
