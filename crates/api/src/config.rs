//! Process configuration read from the environment once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use coffer_infra::CoordinatorConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Postgres URL; `Some` selects the persistent store.
    pub database_url: Option<String>,
    pub coordinator: CoordinatorConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = CoordinatorConfig::default();

        let bind_addr = parse_var(&lookup, "BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let persistent = parse_var::<bool>(&lookup, "USE_PERSISTENT_STORES")?.unwrap_or(false);
        let database_url = if persistent {
            match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
                Some(url) => Some(url),
                None => return Err(ConfigError::Missing("DATABASE_URL")),
            }
        } else {
            None
        };

        let coordinator = CoordinatorConfig {
            lock_timeout: parse_var(&lookup, "TRANSFER_LOCK_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            operation_timeout: parse_var(&lookup, "TRANSFER_OPERATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_timeout),
            max_retries: parse_var(&lookup, "TRANSFER_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
        };

        Ok(Self {
            bind_addr,
            database_url,
            coordinator,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
