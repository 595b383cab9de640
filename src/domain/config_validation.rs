//! Configuration validation.
//!
//! Validates every config field before the server or CLI uses it.

use std::net::SocketAddr;

use crate::domain::cumulative::BaseValue;
use crate::domain::error::AnalyticsError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 30;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: i64 = 5;

/// Storage backend named in `[database] backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    let backend = backend(config)?;
    match backend {
        Backend::Sqlite => validate_sqlite(config)?,
        Backend::Postgres => validate_postgres(config)?,
    }
    cumulative_base(config)?;
    validate_web(config)?;
    validate_log(config)?;
    Ok(())
}

pub fn backend(config: &dyn ConfigPort) -> Result<Backend, AnalyticsError> {
    match config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string())
        .trim()
        .to_lowercase()
        .as_str()
    {
        "sqlite" => Ok(Backend::Sqlite),
        "postgres" | "postgresql" => Ok(Backend::Postgres),
        other => Err(invalid(
            "database",
            "backend",
            format!("unknown backend '{other}' (expected sqlite or postgres)"),
        )),
    }
}

/// Base of the cumulative index when a request does not name one.
pub fn cumulative_base(config: &dyn ConfigPort) -> Result<BaseValue, AnalyticsError> {
    match config.get_string("analytics", "cumulative_base") {
        None => Ok(BaseValue::default()),
        Some(raw) => raw.parse().map_err(|e: AnalyticsError| {
            invalid("analytics", "cumulative_base", e.to_string())
        }),
    }
}

pub fn listen_addr(config: &dyn ConfigPort) -> Result<SocketAddr, AnalyticsError> {
    let raw = config
        .get_string("web", "listen")
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
    raw.trim()
        .parse()
        .map_err(|_| invalid("web", "listen", format!("'{raw}' is not a socket address")))
}

fn validate_sqlite(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    if !config.has("sqlite", "path") {
        return Err(AnalyticsError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        });
    }
    let pool_size = positive(config, "sqlite", "pool_size", 4)?;
    if u32::try_from(pool_size).is_err() {
        return Err(invalid("sqlite", "pool_size", "pool_size is too large"));
    }
    positive(
        config,
        "sqlite",
        "connection_timeout_secs",
        DEFAULT_CONNECTION_TIMEOUT_SECS,
    )?;
    Ok(())
}

fn validate_postgres(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    let port = config.get_int("postgres", "port", 5432);
    if !(1..=65535).contains(&port) {
        return Err(invalid("postgres", "port", "port must be within 1-65535"));
    }
    let min_conn = config.get_int("postgres", "min_conn", 1);
    if min_conn < 0 {
        return Err(invalid("postgres", "min_conn", "min_conn must be non-negative"));
    }
    let max_conn = positive(config, "postgres", "max_conn", 20)?;
    if min_conn > max_conn {
        return Err(invalid(
            "postgres",
            "min_conn",
            "min_conn must not exceed max_conn",
        ));
    }
    positive(
        config,
        "postgres",
        "connection_timeout_secs",
        DEFAULT_CONNECTION_TIMEOUT_SECS,
    )?;
    Ok(())
}

fn validate_web(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    listen_addr(config)?;
    positive(
        config,
        "web",
        "request_timeout_secs",
        DEFAULT_REQUEST_TIMEOUT_SECS,
    )?;
    Ok(())
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    if let Some(format) = config.get_string("log", "format") {
        match format.trim().to_lowercase().as_str() {
            "pretty" | "json" | "compact" => {}
            _ => {
                return Err(invalid(
                    "log",
                    "format",
                    "format must be pretty, json or compact",
                ));
            }
        }
    }
    Ok(())
}

fn positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, AnalyticsError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
