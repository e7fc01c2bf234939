//! The persistent Stratum session (§4.6): connect, subscribe, authorize,
//! then alternate between consuming `mining.notify`/`mining.set_difficulty`
//! push messages and writing out `mining.submit` requests handed in from
//! the worker side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tokio_util::codec::{Framed, LinesCodec};

use miner_core::{config::Config, restart::WorkRestart, slot::SharedJobSlot};

use crate::context::StratumContext;
use crate::error::StratumError;
use crate::job::{build_work, JobHandle};
use crate::protocol::{
    authorize_request, parse_notify, parse_subscribe_result, submit_request, subscribe_request,
    Request, Response,
};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// A found share, ready to submit against the exact job/extranonce2 pair
/// that produced it.
pub struct ShareSubmission {
    pub handle: JobHandle,
    pub ntime: u32,
    pub nonce: u32,
    pub reply: oneshot::Sender<Result<bool, StratumError>>,
}

/// What the rest of the process uses to hand solved shares to the
/// connection that owns the socket.
#[derive(Clone)]
pub struct StratumHandle {
    submit_tx: mpsc::UnboundedSender<ShareSubmission>,
}

impl StratumHandle {
    pub async fn submit(&self, handle: JobHandle, ntime: u32, nonce: u32) -> Result<bool, StratumError> {
        let (reply, rx) = oneshot::channel();
        self.submit_tx
            .send(ShareSubmission { handle, ntime, nonce, reply })
            .map_err(|_| StratumError::Protocol("stratum client task has stopped".into()))?;
        rx.await
            .map_err(|_| StratumError::Protocol("stratum client dropped the reply channel".into()))?
    }
}

/// Runs the Stratum session for the process lifetime, reconnecting on
/// error per `config.retries`/`config.fail_pause_secs`. Returns once
/// retries are exhausted (§4.6 Terminate).
pub async fn run(
    config: Config,
    ctx: Arc<StratumContext>,
    slot: Arc<SharedJobSlot>,
    restart: Arc<WorkRestart>,
) -> (StratumHandle, tokio::task::JoinHandle<Result<(), StratumError>>) {
    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_loop(config, ctx, slot, restart, submit_rx));
    (StratumHandle { submit_tx }, join)
}

async fn run_loop(
    config: Config,
    ctx: Arc<StratumContext>,
    slot: Arc<SharedJobSlot>,
    restart: Arc<WorkRestart>,
    mut submit_rx: mpsc::UnboundedReceiver<ShareSubmission>,
) -> Result<(), StratumError> {
    let mut attempt: i32 = 0;
    let is_scrypt = matches!(config.algorithm, miner_hash::Algorithm::Scrypt { .. });

    loop {
        match session(&config, &ctx, &slot, &restart, &mut submit_rx, is_scrypt).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!("stratum session ended: {e}");
                attempt += 1;
                if config.retries >= 0 && attempt > config.retries {
                    return Err(StratumError::RetriesExhausted);
                }
                tokio::time::sleep(Duration::from_secs(config.fail_pause_secs as u64)).await;
            }
        }
    }
}

/// One connect→subscribe→authorize→notify-loop pass. Returns `Ok` only if
/// asked to stop cleanly (never happens today); any disconnect or
/// protocol error bubbles up to `run_loop` for the retry/backoff policy.
async fn session(
    config: &Config,
    ctx: &Arc<StratumContext>,
    slot: &Arc<SharedJobSlot>,
    restart: &Arc<WorkRestart>,
    submit_rx: &mut mpsc::UnboundedReceiver<ShareSubmission>,
    is_scrypt: bool,
) -> Result<(), StratumError> {
    let (host, port) = parse_host_port(&config.url)?;
    let stream = match &config.proxy {
        Some(proxy) => {
            let (proxy_host, proxy_port) = parse_host_port(proxy)?;
            info!("connecting to stratum+tcp://{host}:{port} via SOCKS5 proxy {proxy_host}:{proxy_port}");
            Socks5Stream::connect((proxy_host.as_str(), proxy_port), (host.as_str(), port))
                .await?
                .into_inner()
        }
        None => {
            info!("connecting to stratum+tcp://{host}:{port}");
            TcpStream::connect((host.as_str(), port)).await?
        }
    };

    let codec = LinesCodec::new_with_max_length(65536);
    let mut framed = Framed::new(stream, codec);

    let next_id = AtomicU64::new(1);
    let pending: Mutex<HashMap<u64, oneshot::Sender<Value>>> = Mutex::new(HashMap::new());

    // Subscribe.
    let sub_id = next_id.fetch_add(1, Ordering::SeqCst);
    send_request(&mut framed, &subscribe_request(sub_id)).await?;
    let sub_result = await_response(&mut framed, sub_id, &pending).await?;
    let (xnonce1, xnonce2_size) = parse_subscribe_result(&sub_result)?;
    ctx.set_subscription(xnonce1, xnonce2_size);

    // Authorize.
    let user = config.user.as_deref().unwrap_or("");
    let pass = config.pass.as_deref().unwrap_or("");
    let auth_id = next_id.fetch_add(1, Ordering::SeqCst);
    send_request(&mut framed, &authorize_request(auth_id, user, pass)).await?;
    let auth_result = await_response(&mut framed, auth_id, &pending).await?;
    if !auth_result.as_bool().unwrap_or(false) {
        return Err(StratumError::AuthRejected(format!("user {user} rejected")));
    }
    info!("stratum authorized as {user}");

    loop {
        tokio::select! {
            line = timeout(NOTIFY_TIMEOUT, framed.next()) => {
                let line = line.map_err(|_| StratumError::Timeout)?
                    .ok_or_else(|| StratumError::Protocol("connection closed".into()))??;
                handle_line(&line, ctx, slot, restart, &pending, is_scrypt).await?;
            }
            Some(share) = submit_rx.recv() => {
                let id = next_id.fetch_add(1, Ordering::SeqCst);
                let (tx, rx) = oneshot::channel();
                pending.lock().await.insert(id, tx);
                let user = config.user.clone().unwrap_or_default();
                let req = submit_request(
                    id,
                    &user,
                    &share.handle.job_id,
                    &miner_util::bytes_to_hex(&share.handle.xnonce2),
                    &format!("{:08x}", share.ntime),
                    &format!("{:08x}", share.nonce),
                );
                send_request(&mut framed, &req).await?;
                let reply = share.reply;
                tokio::spawn(async move {
                    let result = rx.await.map(|v| v.as_bool().unwrap_or(false))
                        .map_err(|_| StratumError::Protocol("submit reply dropped".into()));
                    let _ = reply.send(result);
                });
            }
        }
    }
}

async fn handle_line(
    line: &str,
    ctx: &Arc<StratumContext>,
    slot: &Arc<SharedJobSlot>,
    restart: &Arc<WorkRestart>,
    pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    is_scrypt: bool,
) -> Result<(), StratumError> {
    let resp: Response = serde_json::from_str(line)?;

    match resp.method.as_deref() {
        Some("mining.notify") => {
            let job = parse_notify(&resp.params)?;
            let clean = job.clean_jobs;
            ctx.set_job(job);
            if let Some((work, _handle)) = build_work(ctx, is_scrypt) {
                slot.replace(work);
                if clean {
                    restart.restart_all();
                }
            }
        }
        Some("mining.set_difficulty") => {
            if let Some(d) = resp.params.as_array().and_then(|a| a.first()).and_then(|v| v.as_f64()) {
                ctx.set_difficulty(d);
            }
        }
        Some(other) => {
            debug!("ignoring unsupported stratum method: {other}");
        }
        None => {
            if let Some(id) = resp.id {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(resp.result);
                }
            }
        }
    }

    Ok(())
}

async fn send_request(
    framed: &mut Framed<TcpStream, LinesCodec>,
    req: &Request,
) -> Result<(), StratumError> {
    let line = serde_json::to_string(req)?;
    framed.send(line).await?;
    Ok(())
}

async fn await_response(
    framed: &mut Framed<TcpStream, LinesCodec>,
    id: u64,
    pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
) -> Result<Value, StratumError> {
    loop {
        let line = timeout(NOTIFY_TIMEOUT, framed.next())
            .await
            .map_err(|_| StratumError::Timeout)?
            .ok_or_else(|| StratumError::Protocol("connection closed".into()))??;
        let resp: Response = serde_json::from_str(&line)?;
        if resp.method.is_none() {
            if resp.id == Some(id) {
                return Ok(resp.result);
            }
            if let Some(other_id) = resp.id {
                pending.lock().await.remove(&other_id);
            }
        }
    }
}

fn parse_host_port(url: &str) -> Result<(String, u16), StratumError> {
    let without_scheme = url
        .rsplit_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let (host, port) = without_scheme
        .split_once(':')
        .ok_or_else(|| StratumError::Protocol(format!("expected host:port in {url}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| StratumError::Protocol(format!("bad port in {url}")))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stratum_url() {
        let (host, port) = parse_host_port("stratum+tcp://pool.example.com:3333").unwrap();
        assert_eq!(host, "pool.example.com");
        assert_eq!(port, 3333);
    }

    #[test]
    fn parses_bare_host_port() {
        let (host, port) = parse_host_port("127.0.0.1:3333").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 3333);
    }

    #[test]
    fn rejects_missing_port() {
        assert!(parse_host_port("pool.example.com").is_err());
    }
}
