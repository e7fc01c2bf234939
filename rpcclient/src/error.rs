use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC server returned an error: {0}")]
    Server(String),

    #[error("assembly error: {0}")]
    Assembly(#[from] miner_assembler::GbtError),

    #[error("no usable upstream protocol (GBT rejected, GetWork disabled)")]
    NoUsableProtocol,

    #[error("retries exhausted, giving up")]
    RetriesExhausted,

    #[error("invalid RPC URL: {0}")]
    InvalidUrl(String),
}
