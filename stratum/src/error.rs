use thiserror::Error;

#[derive(Error, Debug)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("SOCKS5 proxy error: {0}")]
    Proxy(#[from] tokio_socks::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authorization rejected: {0}")]
    AuthRejected(String),

    #[error("connection idle past timeout")]
    Timeout,

    #[error("retries exhausted, giving up")]
    RetriesExhausted,
}
