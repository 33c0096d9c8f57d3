//! Server configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default maximum message/body size (100 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Default connection timeout
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(1200);

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address every listener binds to
    pub host: IpAddr,
    /// gRPC port
    pub grpc_port: u16,
    /// REST port
    pub rest_port: u16,
    /// Health-probe port
    pub probes_port: u16,
    /// Maximum gRPC message and REST body size in bytes
    pub max_message_size: usize,
    /// Request deadline applied by the transports
    pub connection_timeout: Duration,
    /// Prepared-plan cache capacity (0 = unbounded)
    pub cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            grpc_port: 8000,
            rest_port: 8080,
            probes_port: 10080,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            cache_capacity: 0,
        }
    }
}

impl ServerConfig {
    /// gRPC listen address
    #[must_use]
    pub fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.grpc_port)
    }

    /// REST listen address
    #[must_use]
    pub fn rest_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.rest_port)
    }

    /// Health-probe listen address
    #[must_use]
    pub fn probes_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.probes_port)
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Duration string not understood
    #[error("invalid duration '{0}': use forms like 1200s, 20m, 1h30m, 500ms")]
    InvalidDuration(String),
}

/// Parse a duration such as `1200s`, `20m`, `1h30m`, `500ms` or bare seconds
///
/// # Errors
///
/// Returns error on an empty string, an unknown unit or a missing number
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(digits);
        let value: u64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let part = match unit {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(invalid)?;
        rest = next;
    }

    Ok(total)
}
