//! Small helpers shared across the cpuminer workspace: hex conversion,
//! wall-clock access and CPU pinning. Nothing here is mining-specific.

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    #[error("hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Converts a hex string to bytes.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, UtilError> {
    Ok(hex::decode(s)?)
}

/// Converts bytes to a hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes exactly `N` bytes, erroring if the hex string is the wrong length.
/// Used for header fields (prev-hash, bits, target) where the pool is
/// trusted but a truncated field should not silently under-fill a buffer.
pub fn hex_to_array<const N: usize>(s: &str) -> Result<[u8; N], UtilError> {
    let bytes = hex_to_bytes(s)?;
    if bytes.len() != N {
        return Err(UtilError::InvalidFormat(format!(
            "expected {} bytes, got {}",
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

/// Pins the calling thread to a CPU core. Mirrors the original miner's
/// "only pin when thread count is a multiple of the core count" rule so
/// odd thread counts don't pile up on core 0.
pub fn affine_to_cpu(worker_index: usize, num_threads: usize) {
    let core_ids = match core_affinity::get_core_ids() {
        Some(ids) if !ids.is_empty() => ids,
        _ => return,
    };

    if num_threads == 0 || num_threads % core_ids.len() != 0 {
        return;
    }

    let target = core_ids[worker_index % core_ids.len()];
    core_affinity::set_for_current(target);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let s = bytes_to_hex(&bytes);
        assert_eq!(s, "deadbeef");
        assert_eq!(hex_to_bytes(&s).unwrap(), bytes);
    }

    #[test]
    fn hex_to_array_checks_length() {
        let err = hex_to_array::<4>("deadbeefaa").unwrap_err();
        assert!(matches!(err, UtilError::InvalidFormat(_)));
        let ok: [u8; 2] = hex_to_array("cafe").unwrap();
        assert_eq!(ok, [0xca, 0xfe]);
    }
}
