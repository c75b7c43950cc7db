//! confsync-leaf binary entry point.
//!
//! Usage:
//! ```bash
//! confsync-leaf --config leaf.toml
//! confsync-leaf --help
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sync_leaf::{http, Config, LeafState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "confsync-leaf")]
#[command(version, about = "confsync leaf - holds the pushed configuration and runs tasks")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "leaf.toml")]
    config: PathBuf,

    /// Override the HTTP bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Push key (overrides the config file).
    #[arg(long, env = "CONFSYNC_LEAF_KEY", hide_env_values = true)]
    push_key: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sync_leaf=info,confsync_leaf=info".into()),
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
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(key) = args.push_key {
        config.security.push_key = key;
    }

    let state = Arc::new(LeafState::new(&config)?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.bind_address,
        "Starting confsync-leaf"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal_token.cancel();
    });

    http::serve(listener, state, shutdown).await?;

    info!("confsync-leaf stopped");
    Ok(())
}
