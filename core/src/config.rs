//! Plain runtime configuration, built once by the CLI layer and handed
//! down to every task/thread explicitly — no process-wide singletons.

use miner_hash::Algorithm;

#[derive(Debug, Clone)]
pub struct Config {
    pub algorithm: Algorithm,
    pub threads: usize,
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Already-resolved output script for the coinbase payout. Address
    /// parsing/encoding is handled upstream of this crate.
    pub coinbase_script: Vec<u8>,
    /// The payout address string itself, echoed verbatim as the
    /// `coinbase-addr` parameter of every `getblocktemplate` call.
    pub coinbase_address: String,
    pub coinbase_sig: String,
    pub retries: i32,
    pub fail_pause_secs: u32,
    pub scantime_secs: u32,
    pub timeout_secs: u32,
    pub benchmark: bool,
    /// Only ever set true by a long-poll response's `submitold` field.
    pub submit_old: bool,
    /// Whether falling back to the legacy `getwork` protocol is permitted
    /// when `getblocktemplate` returns HTTP 404 (§4.4/S5).
    pub allow_getwork: bool,
    /// `socks5://host:port` proxy for the RPC HTTP client and the Stratum
    /// TCP connection.
    pub proxy: Option<String>,
    /// PEM file with an extra trusted CA certificate for the RPC HTTP client.
    pub cert: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            algorithm: Algorithm::Sha256d,
            threads: 1,
            url: String::new(),
            user: None,
            pass: None,
            coinbase_script: Vec::new(),
            coinbase_address: String::new(),
            coinbase_sig: String::new(),
            retries: -1,
            fail_pause_secs: 30,
            scantime_secs: 5,
            timeout_secs: 270,
            benchmark: false,
            submit_old: false,
            allow_getwork: true,
            proxy: None,
            cert: None,
        }
    }
}
