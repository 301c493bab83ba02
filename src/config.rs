//! Bridge configuration and component factory
//!
//! Command-line flags are parsed by the binary; this module validates them into
//! a [`BridgeConfig`] and builds the gateway the config asks for.

use crate::gateway::{ClickHouseGateway, ClickHouseOptions, Gateway, MemoryGateway};
use crate::query::IgnoreLabel;
use crate::schema::TableName;
use crate::{Error, Result};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default listen port
pub const DEFAULT_HTTP_PORT: u16 = 9131;
/// Default request body limit (32 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Which storage backend to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayKind {
    /// In-process storage; data is lost on restart
    Memory,
    /// ClickHouse HTTP interface at the given base URL
    ClickHouse { url: String },
}

/// Validated bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub listen: SocketAddr,
    pub gateway: GatewayKind,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_timeout: Option<Duration>,
    pub table: TableName,
    pub ignore_label: Option<IgnoreLabel>,
    pub max_body_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_HTTP_PORT),
            gateway: GatewayKind::ClickHouse {
                url: "http://127.0.0.1:8123".to_string(),
            },
            database: None,
            username: None,
            password: None,
            db_timeout: None,
            table: TableName::default_samples(),
            ignore_label: Some(IgnoreLabel::new("remote", "clickhouse")),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Parse `[addr:]port`. A bare port (or `:port`) listens on all interfaces.
pub fn parse_listen_addr(value: &str) -> Result<SocketAddr> {
    let value = value.trim();
    let port_only = value.strip_prefix(':').unwrap_or(value);
    if let Ok(port) = port_only.parse::<u16>() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address '{}': {}", value, e)))
}

/// Parse the database target: `memory`, `host:port` or a full `http(s)://` URL.
pub fn parse_gateway_kind(value: &str) -> Result<GatewayKind> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Config("database address cannot be empty".to_string()));
    }
    if value.eq_ignore_ascii_case("memory") {
        return Ok(GatewayKind::Memory);
    }

    let url = if value.starts_with("http://") || value.starts_with("https://") {
        value.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", value)
    };
    Ok(GatewayKind::ClickHouse { url })
}

/// Parse `name=value`; an empty string disables the ignore label.
pub fn parse_ignore_label(value: &str) -> Result<Option<IgnoreLabel>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| Error::Config(format!("invalid ignore label: {}", e)))
}

pub fn parse_table(value: &str) -> Result<TableName> {
    value.parse().map_err(Error::Config)
}

/// Treat empty strings from flags or env as unset.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the storage gateway selected by `config`
    pub fn create_gateway(config: &BridgeConfig) -> Result<Arc<dyn Gateway>> {
        match &config.gateway {
            GatewayKind::Memory => {
                info!("Using in-memory storage (development mode)");
                Ok(Arc::new(MemoryGateway::new()))
            }
            GatewayKind::ClickHouse { url } => {
                info!(url = %url, table = %config.table, "Using ClickHouse storage");
                let options = ClickHouseOptions {
                    url: url.clone(),
                    database: config.database.clone(),
                    username: config.username.clone(),
                    password: config.password.clone(),
                    timeout: config.db_timeout,
                };
                Ok(Arc::new(ClickHouseGateway::new(options)?))
            }
        }
    }
}
