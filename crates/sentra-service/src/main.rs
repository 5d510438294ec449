//! sentra-service — the authorization & accounting daemon.
//!
//! Startup sequence:
//!   1. Open (or initialise) the ledger database
//!   2. Load the service configuration (JSON file or defaults)
//!   3. Construct the pipeline: event source → rebuilder → pusher
//!   4. Start the JSON-RPC 2.0 control surface
//!   5. Run the scheduler: block-poll and periodic refresh both funnel
//!      into a single-flight cycle; triggers during a running cycle are
//!      dropped, not queued

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use sentra_authorizer::SpendAuthorizer;
use sentra_core::types::Address;
use sentra_indexer::{EventSource, GraphQlIndexerClient, HttpSubstrateClient};
use sentra_oracle::{ConstantFeed, PriceOracle};
use sentra_pusher::AllowancePusher;
use sentra_rebuilder::{Rebuilder, RebuilderPolicy};
use sentra_rpc::{RpcServer, RpcServerState};
use sentra_service::enforcement::HttpEnforcementClient;
use sentra_service::{CycleRunner, ServiceConfig};
use sentra_store::LedgerDb;

#[derive(Parser, Debug)]
#[command(
    name = "sentra-service",
    version,
    about = "Sentra — authorization & accounting core for the banking control plane"
)]
struct Args {
    /// Directory for the persistent ledger database.
    #[arg(long, default_value = "~/.sentra/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address for the control surface.
    #[arg(long, default_value = "127.0.0.1:7710")]
    rpc_addr: SocketAddr,

    /// Path to the service configuration JSON (defaults apply when absent).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sentra=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("sentra-service starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let cfg = load_config(args.config.as_deref())?;
    let avatar = Address::from_hex(&cfg.avatar).context("parsing avatar address")?;
    let owner = Address::from_hex(&cfg.owner).context("parsing owner address")?;

    // ── Ledger database ───────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(LedgerDb::open(&data_dir).context("opening ledger database")?);

    // ── Spend authorizer ──────────────────────────────────────────────────────
    let authorizer = SpendAuthorizer::new(
        Arc::clone(&db),
        avatar,
        owner,
        cfg.core.window_duration_seconds,
        cfg.core.max_records_per_eoa,
    )
    .context("constructing spend authorizer")?;

    // ── Price oracle ──────────────────────────────────────────────────────────
    let mut oracle = PriceOracle::new(cfg.core.max_price_feed_age_seconds);
    let mut decimals = HashMap::new();
    let mut tracked_tokens = Vec::new();
    for token_cfg in &cfg.tokens {
        let token = Address::from_hex(&token_cfg.address)
            .with_context(|| format!("parsing token address {}", token_cfg.address))?;
        decimals.insert(token, token_cfg.decimals);
        tracked_tokens.push(token);
        if let Some(price) = &token_cfg.constant_price {
            let answer: i128 = price.parse().context("parsing constant price")?;
            oracle.set_feed(
                token,
                Arc::new(ConstantFeed::new(answer, 18, chrono::Utc::now().timestamp())),
            );
        }
    }

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let substrate = HttpSubstrateClient::new(&cfg.indexer);
    let graphql = cfg
        .indexer
        .graphql_url
        .as_deref()
        .map(GraphQlIndexerClient::new);
    let source = EventSource::new(substrate, graphql, Arc::clone(&db), cfg.core.clone());

    let rebuilder = Rebuilder::new(
        cfg.core.window_duration_seconds,
        decimals,
        RebuilderPolicy::default(),
    );
    let enforcement = Arc::new(HttpEnforcementClient::new(cfg.enforcement_url.as_str()));
    let pusher = AllowancePusher::new(
        enforcement,
        Arc::clone(&db),
        cfg.core.clone(),
        cfg.module.clone(),
        cfg.max_spending_bps,
    );

    let runner = CycleRunner::new(
        source,
        Arc::clone(&db),
        oracle,
        rebuilder,
        pusher,
        cfg.core.clone(),
        tracked_tokens,
    );
    let runner = Arc::new(tokio::sync::Mutex::new(runner));

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        authorizer: tokio::sync::Mutex::new(authorizer),
        db: Arc::clone(&db),
    });
    let _rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Scheduler ─────────────────────────────────────────────────────────────
    // Both triggers share one single-flight mutex: a trigger that arrives
    // while a cycle is running is dropped, not queued.
    let mut poll = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs));
    let mut refresh = tokio::time::interval(Duration::from_secs(cfg.refresh_interval_secs));
    info!("service ready");

    loop {
        tokio::select! {
            _ = poll.tick() => spawn_cycle(Arc::clone(&runner), "block-poll"),
            _ = refresh.tick() => spawn_cycle(Arc::clone(&runner), "refresh"),
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested; waiting for in-flight cycle");
                // Taking the lock waits out a running cycle so no partial
                // sub-account pushes are abandoned mid-flight.
                let _guard = runner.lock().await;
                break;
            }
        }
    }

    db.flush().context("flushing ledger database")?;
    info!("sentra-service stopped");
    Ok(())
}

type Runner = CycleRunner<HttpSubstrateClient, GraphQlIndexerClient, HttpEnforcementClient>;

fn spawn_cycle(runner: Arc<tokio::sync::Mutex<Runner>>, trigger: &'static str) {
    tokio::spawn(async move {
        let Ok(mut guard) = runner.try_lock() else {
            warn!(trigger, "cycle already in progress; trigger dropped");
            return;
        };
        let now = chrono::Utc::now().timestamp();
        match guard.run_cycle(now).await {
            Ok(report) => {
                if report.push.failed > 0 {
                    warn!(failed = report.push.failed, "some submissions unconfirmed");
                }
            }
            Err(e) => warn!(trigger, error = %e, "cycle failed"),
        }
    });
}

/// Load the service config from a JSON file, or fall back to defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    if let Some(p) = path {
        let json = std::fs::read_to_string(p)
            .with_context(|| format!("reading config from {}", p.display()))?;
        return serde_json::from_str(&json).context("parsing service config JSON");
    }
    warn!("no --config provided; using built-in defaults");
    Ok(ServiceConfig::default())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
