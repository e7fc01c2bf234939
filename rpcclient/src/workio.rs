//! The Work I/O task (§4.4): a single consumer draining a command queue,
//! owning the JSON-RPC HTTP client, switching between GBT and the legacy
//! GetWork protocol on a 404, and gating submissions against staleness.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde_json::json;
use tokio::sync::mpsc;

use miner_assembler::{getwork, gbt};
use miner_core::{config::Config, counters::ShareCounters, restart::WorkRestart, slot::SharedJobSlot, work::Work};

use crate::error::RpcError;
use crate::jsonrpc::{RpcClient, RpcOutcome};
use crate::longpoll::LongpollStart;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Gbt,
    GetWork,
}

pub enum WorkCommand {
    GetWork,
    SubmitWork(Work),
}

#[derive(Clone)]
pub struct WorkIoHandle {
    tx: mpsc::UnboundedSender<WorkCommand>,
}

impl WorkIoHandle {
    pub fn request_work(&self) {
        let _ = self.tx.send(WorkCommand::GetWork);
    }

    pub fn submit(&self, work: Work) {
        let _ = self.tx.send(WorkCommand::SubmitWork(work));
    }
}

/// Spawns the Work I/O task. `longpoll_tx` receives the bootstrap
/// endpoint/token the first time a `getblocktemplate` response carries a
/// `longpollid` (§4.1 step 9); later templates don't re-trigger it.
pub fn spawn(
    config: Config,
    slot: Arc<SharedJobSlot>,
    restart: Arc<WorkRestart>,
    longpoll_tx: mpsc::UnboundedSender<LongpollStart>,
    counters: Arc<ShareCounters>,
) -> Result<(WorkIoHandle, tokio::task::JoinHandle<Result<(), RpcError>>), RpcError> {
    let client = RpcClient::new(
        config.url.clone(),
        config.user.clone(),
        config.pass.clone(),
        config.timeout_secs,
        config.proxy.as_deref(),
        config.cert.as_deref(),
    )?;

    let (tx, rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run(config, client, slot, restart, rx, longpoll_tx, counters));
    Ok((WorkIoHandle { tx }, join))
}

async fn run(
    config: Config,
    client: RpcClient,
    slot: Arc<SharedJobSlot>,
    restart: Arc<WorkRestart>,
    mut rx: mpsc::UnboundedReceiver<WorkCommand>,
    longpoll_tx: mpsc::UnboundedSender<LongpollStart>,
    counters: Arc<ShareCounters>,
) -> Result<(), RpcError> {
    let mut protocol = Protocol::Gbt;
    let mut longpoll_started = false;
    let mut next_id: u64 = 1;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkCommand::GetWork => {
                if let Err(e) = get_upstream_work(
                    &config,
                    &client,
                    &slot,
                    &restart,
                    &mut protocol,
                    &mut longpoll_started,
                    &longpoll_tx,
                    &mut next_id,
                )
                .await
                {
                    warn!("get_upstream_work failed: {e}");
                }
            }
            WorkCommand::SubmitWork(work) => {
                if let Err(e) = submit_upstream_work(
                    &config, &client, &slot, protocol, work, &mut next_id, &counters,
                )
                .await
                {
                    warn!("submit_upstream_work failed: {e}");
                }
            }
        }
    }

    Ok(())
}

/// Runs a call with `config.retries` retries and `config.fail_pause_secs`
/// between attempts (§4.4). `-1` retries means retry forever.
async fn with_retries<F, Fut, T>(config: &Config, mut attempt: F) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcError>>,
{
    let mut tries = 0i32;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                tries += 1;
                if config.retries >= 0 && tries > config.retries {
                    return Err(e);
                }
                warn!("rpc call failed ({e}), retrying in {}s", config.fail_pause_secs);
                tokio::time::sleep(Duration::from_secs(config.fail_pause_secs as u64)).await;
            }
        }
    }
}

async fn get_upstream_work(
    config: &Config,
    client: &RpcClient,
    slot: &Arc<SharedJobSlot>,
    restart: &Arc<WorkRestart>,
    protocol: &mut Protocol,
    longpoll_started: &mut bool,
    longpoll_tx: &mpsc::UnboundedSender<LongpollStart>,
    next_id: &mut u64,
) -> Result<(), RpcError> {
    if matches!(*protocol, Protocol::Gbt) && config.coinbase_script.is_empty() && config.allow_getwork {
        info!("no payout script configured, switching to getwork");
        *protocol = Protocol::GetWork;
    }

    let result = with_retries(config, || async {
        let id = *next_id;
        *next_id += 1;
        match *protocol {
            Protocol::Gbt => {
                let params = json!([{
                    "capabilities": ["coinbasetxn", "coinbasevalue", "longpoll", "workid"],
                    "rules": ["segwit"],
                    "coinbase-addr": config.coinbase_address,
                }]);
                match client.call(id, "getblocktemplate", params).await? {
                    RpcOutcome::Ok(resp) => Ok(resp.result),
                    RpcOutcome::NotFound if config.allow_getwork => {
                        info!("getblocktemplate not found, falling back to getwork");
                        *protocol = Protocol::GetWork;
                        match client.call(id, "getwork", json!([])).await? {
                            RpcOutcome::Ok(resp) => Ok(resp.result),
                            RpcOutcome::NotFound => Err(RpcError::NoUsableProtocol),
                        }
                    }
                    RpcOutcome::NotFound => Err(RpcError::NoUsableProtocol),
                }
            }
            Protocol::GetWork => match client.call(id, "getwork", json!([])).await? {
                RpcOutcome::Ok(resp) => Ok(resp.result),
                RpcOutcome::NotFound => Err(RpcError::NoUsableProtocol),
            },
        }
    })
    .await?;

    match *protocol {
        Protocol::Gbt => {
            let assembled = gbt::assemble(&result, config)?;
            slot.replace(assembled.work);
            restart.restart_all();
            if !*longpoll_started {
                if let Some(id) = assembled.longpoll_id {
                    *longpoll_started = true;
                    let _ = longpoll_tx.send(LongpollStart { uri: assembled.longpoll_uri, id });
                }
            }
        }
        Protocol::GetWork => {
            let work = getwork::decode(&result)?;
            slot.replace(work);
            restart.restart_all();
        }
    }

    Ok(())
}

async fn submit_upstream_work(
    config: &Config,
    client: &RpcClient,
    slot: &Arc<SharedJobSlot>,
    protocol: Protocol,
    work: Work,
    next_id: &mut u64,
    counters: &ShareCounters,
) -> Result<(), RpcError> {
    let current = slot.snapshot();
    if work.prev_hash_words() != current.prev_hash_words() && !config.submit_old {
        info!("dropping stale share (prev-hash no longer current)");
        return Ok(());
    }

    let (accepted, reason) = with_retries(config, || async {
        let id = *next_id;
        *next_id += 1;
        let params = match protocol {
            Protocol::Gbt => {
                let header_hex = miner_util::bytes_to_hex(&work.header_bytes());
                let txs = work.txs.clone().unwrap_or_default();
                let block_hex = format!("{header_hex}{txs}");
                match &work.workid {
                    Some(workid) => json!([block_hex, { "workid": workid }]),
                    None => json!([block_hex]),
                }
            }
            Protocol::GetWork => json!([getwork::encode_data_hex(&work)]),
        };
        let method = match protocol {
            Protocol::Gbt => "submitblock",
            Protocol::GetWork => "getwork",
        };
        match client.call(id, method, params).await? {
            RpcOutcome::Ok(resp) => {
                let accepted = resp.result.as_bool().unwrap_or(resp.result.is_null());
                // `submitblock` reports a rejection as a plain string in
                // `result` itself; `getwork` reports it in a sibling
                // `reject-reason` field (spec.md:197).
                let reason = resp.reject_reason.or_else(|| resp.result.as_str().map(str::to_string));
                Ok((accepted, reason))
            }
            RpcOutcome::NotFound => Err(RpcError::NoUsableProtocol),
        }
    })
    .await?;

    if accepted {
        counters.record_accepted();
        info!("share accepted ({} accepted, {} rejected)", counters.accepted(), counters.rejected());
    } else {
        counters.record_rejected();
        match reason {
            Some(reason) => warn!(
                "share rejected by upstream: {reason} ({} accepted, {} rejected)",
                counters.accepted(),
                counters.rejected()
            ),
            None => warn!("share rejected by upstream ({} accepted, {} rejected)", counters.accepted(), counters.rejected()),
        }
    }
    Ok(())
}
