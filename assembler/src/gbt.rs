//! Turns a `getblocktemplate` JSON-RPC response into a `Work` item plus
//! the serialized transaction list `submitblock` expects.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use miner_core::{config::Config, target::nbits_to_target, work::Work};
use miner_hash::sha256d;
use miner_util::{bytes_to_hex, hex_to_bytes};

use crate::coinbase::{build_coinbase, witness_commitment, write_varint, CoinbaseParams};

#[derive(Error, Debug)]
pub enum GbtError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed hex in field {0}: {1}")]
    BadHex(&'static str, miner_util::UtilError),

    #[error("no payout script configured")]
    NoPayoutScript,
}

#[derive(Debug, Deserialize)]
struct TemplateTx {
    data: String,
    txid: Option<String>,
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateCoinbaseTxn {
    data: String,
}

#[derive(Debug, Deserialize)]
struct Template {
    version: u32,
    previousblockhash: String,
    curtime: u32,
    bits: String,
    height: u64,
    target: String,
    transactions: Vec<TemplateTx>,
    coinbasevalue: u64,
    #[serde(default)]
    coinbasetxn: Option<TemplateCoinbaseTxn>,
    #[serde(default)]
    coinbaseaux: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    workid: Option<String>,
    #[serde(default)]
    longpollid: Option<String>,
    #[serde(default)]
    longpolluri: Option<String>,
}

pub struct AssembledWork {
    pub work: Work,
    /// The long-poll connection endpoint, if any — distinct from
    /// `longpoll_id` below (spec.md:81/164).
    pub longpoll_uri: Option<String>,
    /// The opaque token that must be echoed as `longpollid` in the
    /// long-poll task's subsequent `getblocktemplate` calls.
    pub longpoll_id: Option<String>,
}

/// Parses `result` from a `getblocktemplate` response into mineable work.
/// `txs_supplied` is whatever coinbase the template itself provided, if
/// any — cpuminer only builds its own when the template omits one.
pub fn assemble(template_json: &Value, config: &Config) -> Result<AssembledWork, GbtError> {
    let template: Template = serde_json::from_value(template_json.clone())
        .map_err(|_| GbtError::MissingField("template"))?;

    let segwit = template.rules.iter().any(|r| r == "segwit" || r == "!segwit");

    let prev_hash_display =
        hex_to_bytes(&template.previousblockhash).map_err(|e| GbtError::BadHex("previousblockhash", e))?;
    if prev_hash_display.len() != 32 {
        return Err(GbtError::MissingField("previousblockhash"));
    }
    let mut prev_hash_wire = [0u8; 32];
    prev_hash_wire.copy_from_slice(&prev_hash_display);
    prev_hash_wire.reverse();

    let bits_display = hex_to_bytes(&template.bits).map_err(|e| GbtError::BadHex("bits", e))?;
    if bits_display.len() != 4 {
        return Err(GbtError::MissingField("bits"));
    }
    let nbits = u32::from_be_bytes(bits_display.try_into().unwrap());

    let target_display = hex_to_bytes(&template.target).map_err(|e| GbtError::BadHex("target", e))?;
    let target = if target_display.len() == 32 {
        parse_target_hex(&target_display)
    } else {
        nbits_to_target(nbits)
    };

    // Witness root/commitment, if SegWit is active.
    let witness_root = if segwit {
        let mut hashes = Vec::with_capacity(template.transactions.len());
        for tx in &template.transactions {
            let h = tx
                .hash
                .as_ref()
                .or(tx.txid.as_ref())
                .ok_or(GbtError::MissingField("hash"))?;
            let bytes = hex_to_bytes(h).map_err(|e| GbtError::BadHex("hash", e))?;
            if bytes.len() != 32 {
                return Err(GbtError::MissingField("hash"));
            }
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            hashes.push(arr);
        }
        Some(witness_commitment(&hashes))
    } else {
        None
    };

    let coinbase_aux: Vec<Vec<u8>> = template
        .coinbaseaux
        .values()
        .map(|hex| hex_to_bytes(hex).unwrap_or_default())
        .collect();

    // Pools that advertise the `coinbasetxn` capability may hand back a
    // ready-made coinbase; use it verbatim instead of self-building one
    // (cpu-miner.c:341-349). Only the self-built path replays
    // `coinbaseaux`, and it does so unconditionally — `coinbase_append`
    // is never gated on the template's `mutable` array.
    let coinbase_tx = match &template.coinbasetxn {
        Some(supplied) => hex_to_bytes(&supplied.data).map_err(|e| GbtError::BadHex("coinbasetxn.data", e))?,
        None => {
            if config.coinbase_script.is_empty() {
                return Err(GbtError::NoPayoutScript);
            }
            build_coinbase(&CoinbaseParams {
                height: template.height,
                payout_script: &config.coinbase_script,
                coinbase_value: template.coinbasevalue,
                coinbase_sig: config.coinbase_sig.as_bytes(),
                coinbaseaux: &coinbase_aux,
                witness_root,
            })
        }
    };

    // Transaction merkle tree: leaf 0 is the coinbase we just built;
    // leaf i+1 is either the SegWit txid (reversed) or a plain
    // double-SHA-256 of the raw transaction bytes.
    let mut leaves = Vec::with_capacity(template.transactions.len() + 1);
    leaves.push(sha256d(&coinbase_tx));
    for tx in &template.transactions {
        let raw = hex_to_bytes(&tx.data).map_err(|e| GbtError::BadHex("data", e))?;
        let leaf = if segwit {
            let txid_hex = tx.txid.as_ref().ok_or(GbtError::MissingField("txid"))?;
            let mut bytes = hex_to_bytes(txid_hex).map_err(|e| GbtError::BadHex("txid", e))?;
            bytes.reverse();
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            arr
        } else {
            sha256d(&raw)
        };
        leaves.push(leaf);
    }
    let merkle_root = crate::merkle::fold(leaves);

    let mut work = Work::from_header_fields(
        template.version,
        prev_hash_wire,
        merkle_root,
        template.curtime,
        nbits,
        target,
    );
    work.height = Some(template.height);
    work.workid = template.workid;
    work.txs = Some(serialize_tx_list(&coinbase_tx, &template.transactions)?);

    // `longpollid` is the opaque token to echo back; `longpolluri` is just
    // the (optional) connection endpoint override. Only the token's
    // presence signals long-poll support (spec.md:81/164).
    let longpoll_uri = if template.longpollid.is_some() { template.longpolluri } else { None };
    let longpoll_id = template.longpollid;

    Ok(AssembledWork { work, longpoll_uri, longpoll_id })
}

/// Builds the hex blob `submitblock` expects after the header: a varint
/// transaction count, the coinbase, then every other transaction's raw
/// bytes, all concatenated and hex-encoded.
fn serialize_tx_list(coinbase_tx: &[u8], transactions: &[TemplateTx]) -> Result<String, GbtError> {
    let mut out = Vec::new();
    write_varint(&mut out, transactions.len() as u64 + 1);
    out.extend_from_slice(coinbase_tx);
    for tx in transactions {
        let raw = hex_to_bytes(&tx.data).map_err(|e| GbtError::BadHex("data", e))?;
        out.extend_from_slice(&raw);
    }
    Ok(bytes_to_hex(&out))
}

/// GBT's `target` field is given as big-endian display hex; reversed into
/// little-endian words so `target[0]` is least significant (§4.1 step 8).
fn parse_target_hex(display_bytes: &[u8]) -> [u32; 8] {
    let mut wire = display_bytes.to_vec();
    wire.reverse();
    let mut target = [0u32; 8];
    for i in 0..8 {
        target[i] = u32::from_le_bytes(wire[4 * i..4 * i + 4].try_into().unwrap());
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config() -> Config {
        let mut config = Config::default();
        config.coinbase_script = vec![0x76, 0xa9, 0x14, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x88, 0xac];
        config
    }

    #[test]
    fn assembles_a_minimal_non_segwit_template() {
        let template = json!({
            "version": 536870912u32,
            "previousblockhash": "0".repeat(64),
            "curtime": 1_700_000_000u32,
            "bits": "1d00ffff",
            "height": 800_001u64,
            "target": "0".repeat(64),
            "transactions": [],
            "coinbasevalue": 625_000_000u64,
        });
        let config = base_config();
        let assembled = assemble(&template, &config).expect("template should assemble");
        assert_eq!(assembled.work.height, Some(800_001));
        assert!(assembled.work.txs.is_some());
    }

    #[test]
    fn rejects_template_without_payout_script() {
        let template = json!({
            "version": 1u32,
            "previousblockhash": "0".repeat(64),
            "curtime": 1u32,
            "bits": "1d00ffff",
            "height": 1u64,
            "target": "0".repeat(64),
            "transactions": [],
            "coinbasevalue": 0u64,
        });
        let config = Config::default();
        assert!(matches!(assemble(&template, &config), Err(GbtError::NoPayoutScript)));
    }

    #[test]
    fn uses_pool_supplied_coinbasetxn_without_requiring_a_payout_script() {
        let template = json!({
            "version": 1u32,
            "previousblockhash": "0".repeat(64),
            "curtime": 1u32,
            "bits": "1d00ffff",
            "height": 1u64,
            "target": "0".repeat(64),
            "transactions": [],
            "coinbasevalue": 0u64,
            "coinbasetxn": { "data": "deadbeef" },
        });
        let config = Config::default();
        let assembled = assemble(&template, &config).expect("pool-supplied coinbase needs no script");
        assert!(assembled.work.txs.unwrap().starts_with("01deadbeef"));
    }

    #[test]
    fn tracks_longpoll_id_separately_from_longpoll_uri() {
        let template = json!({
            "version": 1u32,
            "previousblockhash": "0".repeat(64),
            "curtime": 1u32,
            "bits": "1d00ffff",
            "height": 1u64,
            "target": "0".repeat(64),
            "transactions": [],
            "coinbasevalue": 0u64,
            "longpollid": "abc123",
            "longpolluri": "/lp/xyz",
        });
        let config = base_config();
        let assembled = assemble(&template, &config).expect("template should assemble");
        assert_eq!(assembled.longpoll_id.as_deref(), Some("abc123"));
        assert_eq!(assembled.longpoll_uri.as_deref(), Some("/lp/xyz"));
    }
}
