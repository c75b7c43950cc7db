//! confsync-hub binary entry point.
//!
//! Usage:
//! ```bash
//! confsync-hub --config hub.toml
//! confsync-hub --help
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sync_hub::cleanup::spawn_cleanup_task;
use sync_hub::storage::SqliteStorage;
use sync_hub::{http, Config, Hub};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "confsync-hub")]
#[command(version, about = "confsync hub - version-authoritative configuration store")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "hub.toml")]
    config: PathBuf,

    /// Override the HTTP bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Identity signing secret (overrides the config file).
    #[arg(long, env = "CONFSYNC_IDENTITY_SECRET", hide_env_values = true)]
    identity_secret: Option<String>,

    /// Registration secret (overrides the config file).
    #[arg(long, env = "CONFSYNC_REGISTRATION_SECRET", hide_env_values = true)]
    registration_secret: Option<String>,

    /// Admin bearer key (overrides the config file).
    #[arg(long, env = "CONFSYNC_ADMIN_KEY", hide_env_values = true)]
    admin_key: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sync_hub=info,confsync_hub=info".into()),
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
    if let Some(secret) = args.identity_secret {
        config.security.identity_secret = secret;
    }
    if let Some(secret) = args.registration_secret {
        config.security.registration_secret = secret;
    }
    if let Some(key) = args.admin_key {
        config.security.admin_key = key;
    }
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.bind_address,
        database = %config.storage.database.display(),
        "Starting confsync-hub"
    );

    let storage = SqliteStorage::new(&config.storage.database).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    let cleanup_config = config.cleanup.clone();
    let hub = Arc::new(Hub::new(config, storage)?);

    let shutdown = CancellationToken::new();
    let cleanup = spawn_cleanup_task(hub.clone(), cleanup_config, shutdown.clone());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal_token.cancel();
    });

    http::serve(listener, hub, shutdown.clone()).await?;
    shutdown.cancel();
    let _ = cleanup.await;

    info!("confsync-hub stopped");
    Ok(())
}
