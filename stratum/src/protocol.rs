//! Stratum v1's line-delimited JSON-RPC wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StratumError;

#[derive(Debug, Serialize)]
pub struct Request {
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct Response {
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Value,
    /// Present on server-initiated lines (`mining.notify`, `mining.set_difficulty`).
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// A parsed `mining.notify` job, before it's merged with context state
/// (extranonce1, the running extranonce2 counter).
pub struct NotifyJob {
    pub job_id: String,
    /// Already in wire order — unlike GBT's `previousblockhash`, pools
    /// pre-arrange this field so a direct per-word decode is correct.
    pub prev_hash_wire: [u8; 32],
    pub coinb1: Vec<u8>,
    pub coinb2: Vec<u8>,
    pub merkle_branch: Vec<[u8; 32]>,
    pub version: u32,
    pub nbits: u32,
    pub ntime: u32,
    pub clean_jobs: bool,
}

pub fn parse_notify(params: &Value) -> Result<NotifyJob, StratumError> {
    let arr = params
        .as_array()
        .ok_or_else(|| StratumError::Protocol("mining.notify params not an array".into()))?;
    if arr.len() < 9 {
        return Err(StratumError::Protocol("mining.notify: too few params".into()));
    }

    let job_id = arr[0]
        .as_str()
        .ok_or_else(|| StratumError::Protocol("job_id not a string".into()))?
        .to_string();

    let prev_hash_bytes = hex_field(&arr[1], "prevhash")?;
    if prev_hash_bytes.len() != 32 {
        return Err(StratumError::Protocol("prevhash wrong length".into()));
    }
    let mut prev_hash_wire = [0u8; 32];
    prev_hash_wire.copy_from_slice(&prev_hash_bytes);

    let coinb1 = hex_field(&arr[2], "coinb1")?;
    let coinb2 = hex_field(&arr[3], "coinb2")?;

    let branch_arr = arr[4]
        .as_array()
        .ok_or_else(|| StratumError::Protocol("merkle_branch not an array".into()))?;
    let mut merkle_branch = Vec::with_capacity(branch_arr.len());
    for b in branch_arr {
        let bytes = hex_field(b, "merkle_branch[]")?;
        if bytes.len() != 32 {
            return Err(StratumError::Protocol("merkle branch hash wrong length".into()));
        }
        let mut arr32 = [0u8; 32];
        arr32.copy_from_slice(&bytes);
        merkle_branch.push(arr32);
    }

    let version = be32_field(&arr[5], "version")?;
    let nbits = be32_field(&arr[6], "nbits")?;
    let ntime = be32_field(&arr[7], "ntime")?;
    let clean_jobs = arr[8].as_bool().unwrap_or(false);

    Ok(NotifyJob {
        job_id,
        prev_hash_wire,
        coinb1,
        coinb2,
        merkle_branch,
        version,
        nbits,
        ntime,
        clean_jobs,
    })
}

fn hex_field(v: &Value, name: &'static str) -> Result<Vec<u8>, StratumError> {
    let s = v
        .as_str()
        .ok_or_else(|| StratumError::Protocol(format!("{name} not a string")))?;
    miner_util::hex_to_bytes(s).map_err(|e| StratumError::Protocol(format!("{name}: {e}")))
}

fn be32_field(v: &Value, name: &'static str) -> Result<u32, StratumError> {
    let bytes = hex_field(v, name)?;
    if bytes.len() != 4 {
        return Err(StratumError::Protocol(format!("{name} wrong length")));
    }
    Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
}

pub fn subscribe_request(id: u64) -> Request {
    Request {
        id,
        method: "mining.subscribe",
        params: serde_json::json!(["cpuminer-rs/1.0"]),
    }
}

pub fn authorize_request(id: u64, user: &str, pass: &str) -> Request {
    Request {
        id,
        method: "mining.authorize",
        params: serde_json::json!([user, pass]),
    }
}

/// Extracts `(xnonce1, xnonce2_size)` from a `mining.subscribe` result:
/// `[subscriptions, extranonce1_hex, extranonce2_size]`.
pub fn parse_subscribe_result(result: &Value) -> Result<(Vec<u8>, usize), StratumError> {
    let arr = result
        .as_array()
        .ok_or_else(|| StratumError::Protocol("subscribe result not an array".into()))?;
    if arr.len() < 3 {
        return Err(StratumError::Protocol("subscribe result too short".into()));
    }
    let xnonce1 = hex_field(&arr[1], "extranonce1")?;
    let xnonce2_size = arr[2]
        .as_u64()
        .ok_or_else(|| StratumError::Protocol("extranonce2_size not a number".into()))? as usize;
    Ok((xnonce1, xnonce2_size))
}

pub fn submit_request(
    id: u64,
    user: &str,
    job_id: &str,
    xnonce2_hex: &str,
    ntime_hex: &str,
    nonce_hex: &str,
) -> Request {
    Request {
        id,
        method: "mining.submit",
        params: serde_json::json!([user, job_id, xnonce2_hex, ntime_hex, nonce_hex]),
    }
}
