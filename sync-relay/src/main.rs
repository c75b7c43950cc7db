//! confsync-relay binary entry point.
//!
//! Usage:
//! ```bash
//! confsync-relay --config relay.toml
//! confsync-relay --help
//! ```

use clap::Parser;
use std::path::PathBuf;
use sync_relay::{Config, EngineOptions, HttpHub, HttpLeaf, LocalCache, RelayMetrics, SyncEngine};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "confsync-relay")]
#[command(version, about = "confsync relay - keeps a leaf in step with the hub")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "relay.toml")]
    config: PathBuf,

    /// Override the hub base URL.
    #[arg(long)]
    hub_url: Option<String>,

    /// Override the leaf base URL.
    #[arg(long)]
    leaf_url: Option<String>,

    /// Override the state directory.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Registration token (overrides the config file).
    #[arg(long, env = "CONFSYNC_REGISTRATION_TOKEN", hide_env_values = true)]
    registration_token: Option<String>,

    /// Leaf push key (overrides the config file).
    #[arg(long, env = "CONFSYNC_LEAF_KEY", hide_env_values = true)]
    leaf_key: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "sync_relay=info,confsync_relay=info".into()),
    );
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = if args.config.exists() {
        Config::from_file(&args.config)?
    } else {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
        Config::default()
    };
    if let Some(url) = args.hub_url {
        config.hub.url = url;
    }
    if let Some(url) = args.leaf_url {
        config.leaf.url = url;
    }
    if let Some(dir) = args.state_dir {
        config.sync.state_dir = dir;
    }
    if let Some(token) = args.registration_token {
        config.hub.registration_token = token;
    }
    if let Some(key) = args.leaf_key {
        config.leaf.key = key;
    }
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hub = %config.hub.url,
        leaf = %config.leaf.url,
        state_dir = %config.sync.state_dir.display(),
        "Starting confsync-relay"
    );

    let hub = HttpHub::new(&config.hub.url, config.hub.fetch_timeout())?;
    let leaf = HttpLeaf::new(&config.leaf.url, &config.leaf.key, config.leaf.push_timeout())?;
    let engine = SyncEngine::new(
        hub,
        leaf,
        LocalCache::new(&config.sync.state_dir),
        EngineOptions::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal_token.cancel();
    });

    engine.run(shutdown).await?;

    let metrics = engine.metrics();
    info!(
        polls = RelayMetrics::get(&metrics.polls_total),
        pushes = RelayMetrics::get(&metrics.pushes_total),
        push_failures = RelayMetrics::get(&metrics.push_failures_total),
        fetch_failures = RelayMetrics::get(&metrics.fetch_failures_total),
        "confsync-relay stopped"
    );
    Ok(())
}
