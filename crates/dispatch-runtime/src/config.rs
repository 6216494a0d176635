//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::LogFormat;

pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "DISPATCH_HOST";
pub const ENV_DATA_FILE: &str = "DISPATCH_DATA_FILE";
pub const ENV_HUB_BUFFER: &str = "DISPATCH_HUB_BUFFER";
pub const ENV_SESSION_BUFFER: &str = "DISPATCH_SESSION_BUFFER";
pub const ENV_LOG_FORMAT: &str = "DISPATCH_LOG_FORMAT";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Dispatch server configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Board snapshot file
    pub data_file: PathBuf,
    /// Capacity of the hub's command queue
    pub hub_buffer: usize,
    /// Sync frames a session may have queued before it is dropped
    pub session_buffer: usize,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 4000),
            data_file: PathBuf::from("data.json"),
            hub_buffer: 1024,
            session_buffer: 64,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup; unset keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();

        if let Some(host) = lookup(ENV_HOST) {
            config.bind_addr.set_ip(parse(ENV_HOST, &host)?);
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.bind_addr.set_port(parse(ENV_PORT, &port)?);
        }
        if let Some(path) = lookup(ENV_DATA_FILE) {
            if path.trim().is_empty() {
                return Err(ConfigError {
                    key: ENV_DATA_FILE,
                    value: path,
                    reason: "path is empty".to_string(),
                });
            }
            config.data_file = PathBuf::from(path);
        }
        if let Some(n) = lookup(ENV_HUB_BUFFER) {
            config.hub_buffer = parse_capacity(ENV_HUB_BUFFER, &n)?;
        }
        if let Some(n) = lookup(ENV_SESSION_BUFFER) {
            config.session_buffer = parse_capacity(ENV_SESSION_BUFFER, &n)?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = parse(ENV_LOG_FORMAT, &format)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_capacity(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match parse(key, value)? {
        0 => Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.data_file, PathBuf::from("data.json"));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DISPATCH_HOST", "127.0.0.1"),
            ("DISPATCH_DATA_FILE", "/var/lib/dispatch/board.json"),
            ("DISPATCH_SESSION_BUFFER", "8"),
            ("DISPATCH_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.data_file, PathBuf::from("/var/lib/dispatch/board.json"));
        assert_eq!(config.session_buffer, 8);
        assert_eq!(config.hub_buffer, 1024);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err.key, "PORT");

        let err = ServerConfig::from_lookup(lookup(&[("DISPATCH_HUB_BUFFER", "0")])).unwrap_err();
        assert_eq!(err.reason, "must be at least 1");

        let err = ServerConfig::from_lookup(lookup(&[("DISPATCH_LOG_FORMAT", "xml")])).unwrap_err();
        assert_eq!(err.key, "DISPATCH_LOG_FORMAT");
    }
}
