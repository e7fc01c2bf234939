//! The legacy `getwork` fallback format: the pool hands back an already
//! fully-assembled 128-byte data buffer and target, no coinbase/merkle
//! construction needed on this side.

use serde::Deserialize;
use serde_json::Value;

use miner_core::work::Work;

use crate::gbt::GbtError;

#[derive(Debug, Deserialize)]
struct GetworkResult {
    data: String,
    target: String,
}

/// Decodes a `getwork` `result` object into `Work`. Both `data` and
/// `target` arrive as big-endian-per-word hex (the same display
/// convention `getblocktemplate` uses for `bits`/`target`), so each 4-byte
/// chunk is byte-swapped into the plain value our `Work::data` words store.
pub fn decode(result: &Value) -> Result<Work, GbtError> {
    let parsed: GetworkResult =
        serde_json::from_value(result.clone()).map_err(|_| GbtError::MissingField("data"))?;

    let data_bytes =
        miner_util::hex_to_bytes(&parsed.data).map_err(|e| GbtError::BadHex("data", e))?;
    if data_bytes.len() != 128 {
        return Err(GbtError::MissingField("data"));
    }

    let target_bytes =
        miner_util::hex_to_bytes(&parsed.target).map_err(|e| GbtError::BadHex("target", e))?;
    if target_bytes.len() != 32 {
        return Err(GbtError::MissingField("target"));
    }

    let mut work = Work::empty();
    for i in 0..32 {
        let chunk: [u8; 4] = data_bytes[4 * i..4 * i + 4].try_into().unwrap();
        work.data[i] = u32::from_be_bytes(chunk);
    }

    let mut target_reversed = target_bytes;
    target_reversed.reverse();
    let mut target = [0u32; 8];
    for i in 0..8 {
        target[i] = u32::from_le_bytes(target_reversed[4 * i..4 * i + 4].try_into().unwrap());
    }
    work.target = target;

    Ok(work)
}

/// Encodes `Work` back into the 256-hex-char `data` param `getwork`
/// submission expects — the inverse of `decode`'s per-word byte-swap.
pub fn encode_data_hex(work: &Work) -> String {
    let mut bytes = Vec::with_capacity(128);
    for word in &work.data {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    miner_util::bytes_to_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_then_encode_round_trips_data() {
        let mut data_hex = String::new();
        for i in 0..32u32 {
            data_hex.push_str(&format!("{:08x}", i));
        }
        let target_hex = "0".repeat(64);
        let result = json!({ "data": data_hex, "target": target_hex });

        let work = decode(&result).expect("well-formed getwork result should decode");
        assert_eq!(work.data[0], 0);
        assert_eq!(work.data[31], 31);
        assert_eq!(encode_data_hex(&work), data_hex);
    }

    #[test]
    fn rejects_undersized_data() {
        let result = json!({ "data": "aabb", "target": "0".repeat(64) });
        assert!(decode(&result).is_err());
    }
}
