//! The long-poll task (§4.5): blocks on a long-poll endpoint and pushes
//! fresh work into the shared slot the instant the upstream chain tip
//! changes, instead of waiting for the next scantime-driven poll.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde_json::json;
use tokio::sync::mpsc;

use miner_assembler::gbt;
use miner_core::{config::Config, restart::WorkRestart, slot::SharedJobSlot};

use crate::error::RpcError;
use crate::jsonrpc::{RpcClient, RpcOutcome};

/// What kicks off (or redirects) the long-poll handshake: the connection
/// endpoint (`uri`, falling back to the base RPC URL when absent) and the
/// opaque `id` token to echo back as `longpollid` — the two are distinct
/// fields in a `getblocktemplate` response and must not be conflated
/// (spec.md:81/164).
pub struct LongpollStart {
    pub uri: Option<String>,
    pub id: String,
}

/// Runs until `start_rx` is dropped. The first `LongpollStart` received
/// (bootstrapped from `getblocktemplate`'s `longpollid`/`longpolluri`)
/// starts a fresh handshake; on any failure other than a clean timeout it
/// backs off and restarts the handshake against the same endpoint/token.
pub async fn run(
    config: Config,
    slot: Arc<SharedJobSlot>,
    restart: Arc<WorkRestart>,
    mut start_rx: mpsc::UnboundedReceiver<LongpollStart>,
) -> Result<(), RpcError> {
    let Some(start) = start_rx.recv().await else {
        return Ok(());
    };
    let mut url = start.uri.unwrap_or_else(|| config.url.clone());
    let mut id = start.id;

    let mut next_id: u64 = 1;
    loop {
        let resolved = resolve_longpoll_url(&config.url, &url);
        let client = RpcClient::new(
            resolved,
            config.user.clone(),
            config.pass.clone(),
            config.timeout_secs,
            config.proxy.as_deref(),
            config.cert.as_deref(),
        )?;

        info!("long-poll: waiting on {url} (id {id})");
        let req_id = next_id;
        next_id += 1;
        let params = json!([{
            "capabilities": ["coinbasetxn", "coinbasevalue", "longpoll", "workid"],
            "rules": ["segwit"],
            "coinbase-addr": config.coinbase_address,
            "longpollid": id,
        }]);
        match client.call_long(req_id, "getblocktemplate", params).await {
            Ok(RpcOutcome::Ok(resp)) => {
                let result = resp.result;
                let submit_old = result["submitold"].as_bool().unwrap_or(false);
                let mut config_for_template = config.clone();
                config_for_template.submit_old = submit_old;
                match gbt::assemble(&result, &config_for_template) {
                    Ok(assembled) => {
                        slot.replace(assembled.work);
                        restart.restart_all();
                        if let Some(new_id) = assembled.longpoll_id {
                            id = new_id;
                        }
                        if let Some(new_uri) = assembled.longpoll_uri {
                            url = new_uri;
                        }
                    }
                    Err(e) => warn!("long-poll: failed to assemble template: {e}"),
                }
            }
            Ok(RpcOutcome::NotFound) => {
                warn!("long-poll endpoint not found, disabling long-poll");
                return Ok(());
            }
            Err(e) => {
                warn!("long-poll call failed: {e}, restarting workers and backing off");
                restart.restart_all();
                tokio::time::sleep(Duration::from_secs(config.fail_pause_secs as u64)).await;
            }
        }

        if let Ok(new_start) = start_rx.try_recv() {
            if let Some(new_uri) = new_start.uri {
                url = new_uri;
            }
            id = new_start.id;
        }
    }
}

/// `longpolluri` may be absolute or relative to the base RPC URL.
fn resolve_longpoll_url(base: &str, longpoll_uri: &str) -> String {
    if longpoll_uri.starts_with("http://") || longpoll_uri.starts_with("https://") {
        return longpoll_uri.to_string();
    }
    match url::Url::parse(base) {
        Ok(base_url) => match base_url.join(longpoll_uri) {
            Ok(joined) => joined.to_string(),
            Err(_) => base.to_string(),
        },
        Err(_) => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_longpoll_uri_against_base() {
        let resolved = resolve_longpoll_url("http://pool.example.com:8332/", "/longpoll/abc123");
        assert_eq!(resolved, "http://pool.example.com:8332/longpoll/abc123");
    }

    #[test]
    fn leaves_absolute_longpoll_uri_untouched() {
        let resolved = resolve_longpoll_url("http://pool.example.com:8332/", "http://other.example.com/lp");
        assert_eq!(resolved, "http://other.example.com/lp");
    }
}
