//! CPU miner entry point: parses the command line into a `Config`, picks
//! the upstream protocol from the pool URL's scheme, and wires the shared
//! job slot / restart flags / hashrate tracker between whichever transport
//! tasks are active and the per-thread scan workers.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn, LevelFilter};
use tokio::sync::mpsc;

use miner_core::{
    config::Config, counters::ShareCounters, restart::WorkRestart, slot::SharedJobSlot,
    target::target_from_difficulty, work::Work, Algorithm,
};
use miner_worker::{HashrateTracker, WorkerHandles, WorkerParams};

#[derive(Parser)]
#[command(name = "cpuminer")]
#[command(about = "CPU proof-of-work miner speaking GetBlockTemplate, getwork and Stratum")]
struct Cli {
    /// Pool or node URL: http(s):// for GBT/getwork, stratum+tcp(s):// for Stratum.
    url: String,

    /// RPC/Stratum username (often the payout address for solo pools).
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// RPC/Stratum password.
    #[arg(short = 'p', long)]
    pass: Option<String>,

    /// Suffixes both username and password with `.<gateway-id>`.
    #[arg(long = "gateway-id")]
    gateway_id: Option<String>,

    /// Hex-encoded payout scriptPubKey for GBT coinbase construction.
    /// Address-to-script conversion happens upstream of this binary.
    #[arg(long = "coinbase-script")]
    coinbase_script: Option<String>,

    /// Payout address, echoed verbatim as the `coinbase-addr` parameter of
    /// every `getblocktemplate` call.
    #[arg(long = "coinbase-addr", default_value = "")]
    coinbase_addr: String,

    /// Extra bytes appended to the coinbase scriptSig.
    #[arg(long = "coinbase-sig", default_value = "")]
    coinbase_sig: String,

    /// `sha256d`, `scrypt`, or `scrypt:N` (N a power of two >= 2).
    #[arg(short = 'a', long = "algo", default_value = "sha256d")]
    algorithm: String,

    /// Number of mining worker threads.
    #[arg(short = 't', long, default_value_t = 1)]
    threads: usize,

    /// RPC/Stratum retry count before giving up; -1 retries forever.
    #[arg(short = 'r', long, default_value_t = -1)]
    retries: i32,

    /// Seconds to wait between retries.
    #[arg(long = "fail-pause", default_value_t = 30)]
    fail_pause: u32,

    /// Maximum seconds between work refreshes when not long-polling.
    #[arg(short = 's', long, default_value_t = 5)]
    scantime: u32,

    /// JSON-RPC socket timeout in seconds.
    #[arg(short = 'T', long, default_value_t = 270)]
    timeout: u32,

    /// Disable falling back to the legacy getwork protocol on a GBT 404.
    #[arg(long = "no-getwork")]
    no_getwork: bool,

    /// SOCKS5 proxy for both the RPC HTTP client and the Stratum socket,
    /// e.g. `socks5://127.0.0.1:9050`.
    #[arg(long)]
    proxy: Option<String>,

    /// PEM file with an extra trusted CA certificate for the RPC HTTP client.
    #[arg(long)]
    cert: Option<String>,

    /// Synthesize one fixed work item offline; skip Work I/O, long-poll
    /// and Stratum entirely.
    #[arg(long)]
    benchmark: bool,

    /// Increase logging verbosity; repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()))
        .format_timestamp_millis()
        .init();
}

/// `stratum+tcp(s)://` selects the Stratum transport; everything else is
/// treated as an http(s) GBT/getwork endpoint (§6).
fn is_stratum_url(url: &str) -> bool {
    url.starts_with("stratum+tcp://") || url.starts_with("stratum+tcps://")
}

fn build_config(cli: &Cli) -> Result<Config, String> {
    let algorithm = Algorithm::parse(&cli.algorithm).map_err(|e| e.to_string())?;

    if !is_stratum_url(&cli.url) && !cli.url.starts_with("http://") && !cli.url.starts_with("https://") {
        return Err(format!(
            "unrecognized pool URL scheme in {:?} (expected http(s):// or stratum+tcp(s)://)",
            cli.url
        ));
    }

    let coinbase_script = match &cli.coinbase_script {
        Some(hex) => miner_util::hex_to_bytes(hex).map_err(|e| format!("invalid --coinbase-script: {e}"))?,
        None => Vec::new(),
    };

    let (user, pass) = match &cli.gateway_id {
        Some(gw) => (
            cli.user.as_ref().map(|u| format!("{u}.{gw}")),
            cli.pass.as_ref().map(|p| format!("{p}.{gw}")).or_else(|| Some(gw.clone())),
        ),
        None => (cli.user.clone(), cli.pass.clone()),
    };

    Ok(Config {
        algorithm,
        threads: cli.threads.max(1),
        url: cli.url.clone(),
        user,
        pass,
        coinbase_script,
        coinbase_address: cli.coinbase_addr.clone(),
        coinbase_sig: cli.coinbase_sig.clone(),
        retries: cli.retries,
        fail_pause_secs: cli.fail_pause,
        scantime_secs: cli.scantime,
        timeout_secs: cli.timeout,
        benchmark: cli.benchmark,
        submit_old: false,
        allow_getwork: !cli.no_getwork,
        proxy: cli.proxy.clone(),
        cert: cli.cert.clone(),
    })
}

/// A fixed, all-`0x55` header (matching the worked nonce-boundary example)
/// judged against a difficulty-1 target, so `--benchmark` measures raw
/// hashrate without any pool (§11 supplement).
fn benchmark_work(algorithm: Algorithm) -> Work {
    let filler = [0x55u8; 32];
    let target = target_from_difficulty(1.0, matches!(algorithm, Algorithm::Scrypt { .. }));
    Work::from_header_fields(0x5555_5555, filler, filler, 0x5555_5555, 0x1d00_ffff, target)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {e}");
            process::exit(1);
        }
    };

    if !is_stratum_url(&config.url) && config.coinbase_script.is_empty() && !config.allow_getwork && !config.benchmark {
        error!("no payout script configured and getwork fallback disabled: nothing to mine");
        process::exit(1);
    }

    info!(
        "starting cpuminer: url={} algorithm={:?} threads={}",
        config.url, config.algorithm, config.threads
    );

    let num_workers = config.threads;
    let restart = Arc::new(WorkRestart::new(num_workers));
    let stats = Arc::new(HashrateTracker::new(num_workers));
    let counters = Arc::new(ShareCounters::new());
    let running = Arc::new(AtomicBool::new(true));

    let initial_work = if config.benchmark {
        benchmark_work(config.algorithm)
    } else {
        Work::empty()
    };
    let slot = Arc::new(SharedJobSlot::new(initial_work));

    let stratum_mode = is_stratum_url(&config.url) && !config.benchmark;

    let (request_work, submit_solution): (
        Arc<dyn Fn() + Send + Sync>,
        Arc<dyn Fn(Work) + Send + Sync>,
    ) = if config.benchmark {
        (
            Arc::new(|| {}) as Arc<dyn Fn() + Send + Sync>,
            Arc::new(|_work: Work| {}) as Arc<dyn Fn(Work) + Send + Sync>,
        )
    } else if stratum_mode {
        let ctx = Arc::new(miner_stratum::StratumContext::new());
        let (stratum_handle, join) =
            miner_stratum::client::run(config.clone(), ctx, slot.clone(), restart.clone()).await;
        tokio::spawn(async move {
            match join.await {
                Ok(Err(e)) => error!("stratum task ended: {e}"),
                Err(e) => error!("stratum task panicked: {e}"),
                Ok(Ok(())) => {}
            }
        });

        let rt_handle = tokio::runtime::Handle::current();
        let counters_for_submit = counters.clone();
        let submit: Arc<dyn Fn(Work) + Send + Sync> = Arc::new(move |work: Work| {
            let stratum_handle = stratum_handle.clone();
            let counters = counters_for_submit.clone();
            let handle = miner_stratum::JobHandle {
                job_id: work.job_id.clone().unwrap_or_default(),
                xnonce2: work.xnonce2.clone(),
            };
            let ntime = work.ntime();
            let nonce = work.nonce();
            rt_handle.spawn(async move {
                match stratum_handle.submit(handle, ntime, nonce).await {
                    Ok(true) => {
                        counters.record_accepted();
                        info!("share accepted ({} accepted, {} rejected)", counters.accepted(), counters.rejected());
                    }
                    Ok(false) => {
                        counters.record_rejected();
                        warn!("share rejected ({} accepted, {} rejected)", counters.accepted(), counters.rejected());
                    }
                    Err(e) => warn!("stratum submit failed: {e}"),
                }
            });
        });

        (Arc::new(|| {}) as Arc<dyn Fn() + Send + Sync>, submit)
    } else {
        let (longpoll_tx, longpoll_rx) = mpsc::unbounded_channel();
        let (workio_handle, workio_join) = match miner_rpcclient::workio::spawn(
            config.clone(),
            slot.clone(),
            restart.clone(),
            longpoll_tx,
            counters.clone(),
        ) {
            Ok(v) => v,
            Err(e) => {
                error!("failed to start work I/O task: {e}");
                process::exit(1);
            }
        };
        tokio::spawn(async move {
            match workio_join.await {
                Ok(Err(e)) => error!("work I/O task ended: {e}"),
                Err(e) => error!("work I/O task panicked: {e}"),
                Ok(Ok(())) => {}
            }
        });

        let longpoll_config = config.clone();
        let longpoll_slot = slot.clone();
        let longpoll_restart = restart.clone();
        tokio::spawn(async move {
            if let Err(e) = miner_rpcclient::longpoll::run(longpoll_config, longpoll_slot, longpoll_restart, longpoll_rx).await {
                warn!("long-poll task ended: {e}");
            }
        });

        workio_handle.request_work();

        let request_handle = workio_handle.clone();
        let submit_handle = workio_handle.clone();
        (
            Arc::new(move || request_handle.request_work()) as Arc<dyn Fn() + Send + Sync>,
            Arc::new(move |work: Work| submit_handle.submit(work)) as Arc<dyn Fn(Work) + Send + Sync>,
        )
    };

    let mut worker_threads = Vec::with_capacity(num_workers);
    for index in 0..num_workers {
        let params = WorkerParams {
            index,
            num_workers,
            algorithm: config.algorithm,
            stratum_mode,
            scantime_secs: config.scantime_secs,
            worker_index_in_core: index,
            affine_to_cpu: num_workers > 1,
        };
        let handles = WorkerHandles {
            slot: slot.clone(),
            restart: restart.clone(),
            stats: stats.clone(),
            running: running.clone(),
            request_work: request_work.clone(),
            submit_solution: submit_solution.clone(),
        };
        let join = std::thread::Builder::new()
            .name(format!("worker-{index}"))
            .spawn(move || miner_worker::run(params, handles))
            .expect("failed to spawn worker thread");
        worker_threads.push(join);
    }

    let summary_stats = stats.clone();
    let summary_counters = counters.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
            info!(
                "hashrate: {:.2} kH/s, shares: {} accepted / {} rejected",
                summary_stats.total() / 1000.0,
                summary_counters.accepted(),
                summary_counters.rejected()
            );
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install ctrl-c handler: {e}");
    }
    info!("shutting down");
    running.store(false, Ordering::SeqCst);
    process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn recognizes_stratum_schemes() {
        assert!(is_stratum_url("stratum+tcp://pool.example.com:3333"));
        assert!(is_stratum_url("stratum+tcps://pool.example.com:3443"));
        assert!(!is_stratum_url("http://pool.example.com:8332"));
        assert!(!is_stratum_url("https://pool.example.com:8332"));
    }

    #[test]
    fn build_config_rejects_unrecognized_scheme() {
        let cli = parse(&["cpuminer", "ftp://pool.example.com"]);
        let err = build_config(&cli).unwrap_err();
        assert!(err.contains("unrecognized pool URL scheme"));
    }

    #[test]
    fn build_config_rejects_bad_coinbase_hex() {
        let cli = parse(&[
            "cpuminer",
            "http://pool.example.com:8332",
            "--coinbase-script",
            "not-hex",
        ]);
        let err = build_config(&cli).unwrap_err();
        assert!(err.contains("invalid --coinbase-script"));
    }

    #[test]
    fn build_config_suffixes_user_and_pass_with_gateway_id() {
        let cli = parse(&[
            "cpuminer",
            "stratum+tcp://pool.example.com:3333",
            "-u",
            "worker1",
            "-p",
            "x",
            "--gateway-id",
            "gw7",
        ]);
        let config = build_config(&cli).expect("valid config");
        assert_eq!(config.user.as_deref(), Some("worker1.gw7"));
        assert_eq!(config.pass.as_deref(), Some("x.gw7"));
    }

    #[test]
    fn build_config_gateway_id_without_pass_uses_gateway_as_pass() {
        let cli = parse(&[
            "cpuminer",
            "stratum+tcp://pool.example.com:3333",
            "-u",
            "worker1",
            "--gateway-id",
            "gw7",
        ]);
        let config = build_config(&cli).expect("valid config");
        assert_eq!(config.pass.as_deref(), Some("gw7"));
    }

    #[test]
    fn build_config_threads_floor_is_one() {
        let cli = parse(&["cpuminer", "http://pool.example.com:8332", "-t", "0"]);
        let config = build_config(&cli).expect("valid config");
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn benchmark_work_meets_difficulty_one_target() {
        let work = benchmark_work(Algorithm::Sha256d);
        let header = work.header_bytes();
        assert_eq!(header.len(), 80);
        assert_eq!(header[0..4], [0x55, 0x55, 0x55, 0x55]);
    }
}
