//! tsbridge binary
//!
//! Prometheus remote storage bridge for ClickHouse.

use tsbridge::api::{self, ApiState};
use tsbridge::config::{self, BridgeConfig, ComponentFactory, DEFAULT_MAX_BODY_SIZE};
use tsbridge::query::MatcherTranslator;
use tsbridge::{telemetry, Error};

use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// tsbridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address, [addr:]port
    #[arg(long = "http", env = "TSBRIDGE_HTTP", default_value = "9131")]
    http: String,

    /// ClickHouse HTTP address (host:port or URL), or "memory"
    #[arg(long = "db", env = "TSBRIDGE_DB", default_value = "127.0.0.1:8123")]
    db: String,

    /// Default database for the connection
    #[arg(long = "db.database", env = "TSBRIDGE_DB_DATABASE")]
    db_database: Option<String>,

    /// Database user
    #[arg(long = "db.username", env = "TSBRIDGE_DB_USERNAME")]
    db_username: Option<String>,

    /// Database password
    #[arg(long = "db.password", env = "TSBRIDGE_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    /// Per-request database timeout (e.g. "30s"); unset means no timeout
    #[arg(long = "db.timeout", env = "TSBRIDGE_DB_TIMEOUT", value_parser = humantime::parse_duration)]
    db_timeout: Option<Duration>,

    /// Samples table, [database.]table
    #[arg(long, env = "TSBRIDGE_TABLE", default_value = "metrics.samples")]
    table: String,

    /// Equality matcher dropped from read queries, name=value; empty disables
    #[arg(long = "read.ignore-label", env = "TSBRIDGE_READ_IGNORE_LABEL", default_value = "remote=clickhouse")]
    read_ignore_label: String,

    /// Maximum request body size in bytes
    #[arg(long, env = "TSBRIDGE_MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,

    /// Log level
    #[arg(long, env = "TSBRIDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> tsbridge::Result<BridgeConfig> {
        Ok(BridgeConfig {
            listen: config::parse_listen_addr(&self.http)?,
            gateway: config::parse_gateway_kind(&self.db)?,
            database: config::non_empty(self.db_database),
            username: config::non_empty(self.db_username),
            password: config::non_empty(self.db_password),
            db_timeout: self.db_timeout,
            table: config::parse_table(&self.table)?,
            ignore_label: config::parse_ignore_label(&self.read_ignore_label)?,
            max_body_size: self.max_body_size,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::init_logging(&args.log_level)?;

    let config = args.into_config()?;
    info!(
        listen = %config.listen,
        table = %config.table,
        ignore_label = ?config.ignore_label.as_ref().map(|l| l.to_string()),
        "Starting tsbridge"
    );

    let gateway = ComponentFactory::create_gateway(&config)?;
    let state = ApiState::new(
        gateway,
        config.table.clone(),
        MatcherTranslator::new(config.ignore_label.clone()),
    );
    let router = api::build_http_router(state, config.max_body_size);

    let listener = TcpListener::bind(config.listen).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!(listen = %listener.local_addr()?, "tsbridge ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .map_err(Error::Io)?;

    info!("tsbridge shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
}
