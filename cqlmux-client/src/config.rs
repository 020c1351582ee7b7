//! Connection configuration.
//!
//! Values come from the builder methods; `apply_env_overrides` layers the
//! `CQLMUX_*` environment variables on top.

use cqlmux_protocol::{DEFAULT_CQL_VERSION, DEFAULT_PORT, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Optional bound on the STARTUP to READY wait. `None` waits forever.
    pub ready_timeout: Option<Duration>,
    /// Version byte sent in request frames.
    pub protocol_version: u8,
    /// CQL version announced in STARTUP.
    pub cql_version: String,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Log every frame sent and received at trace level.
    pub trace_frames: bool,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
            ready_timeout: None,
            protocol_version: PROTOCOL_VERSION,
            cql_version: DEFAULT_CQL_VERSION.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            trace_frames: false,
        }
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Returns the `host:port` pair to dial.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Sets the request version byte. Versions below 3 use 8-bit stream
    /// ids and are clamped up.
    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version.clamp(MIN_PROTOCOL_VERSION, PROTOCOL_VERSION);
        self
    }

    pub fn with_cql_version(mut self, version: impl Into<String>) -> Self {
        self.cql_version = version.into();
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_trace_frames(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    /// Applies environment variable overrides. Unparseable values are
    /// ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CQLMUX_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var("CQLMUX_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(version) = std::env::var("CQLMUX_CQL_VERSION") {
            if !version.is_empty() {
                self.cql_version = version;
            }
        }

        if let Ok(version) = std::env::var("CQLMUX_PROTOCOL_VERSION") {
            if let Ok(v) = version.parse::<u8>() {
                self.protocol_version = v.clamp(MIN_PROTOCOL_VERSION, PROTOCOL_VERSION);
            }
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:9042");
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.ready_timeout, None);
        assert_eq!(config.protocol_version, 4);
        assert_eq!(config.cql_version, "3.0.0");
        assert!(!config.trace_frames);
    }

    #[test]
    fn test_config_buffer_clamping() {
        let config = ConnectionConfig::default().with_read_buffer_size(100);
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let config = ConnectionConfig::default().with_read_buffer_size(10 * 1024 * 1024);
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_protocol_version_clamping() {
        assert_eq!(
            ConnectionConfig::default()
                .with_protocol_version(2)
                .protocol_version,
            3
        );
        assert_eq!(
            ConnectionConfig::default()
                .with_protocol_version(5)
                .protocol_version,
            4
        );
    }

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::new("db.internal", 19042)
            .with_ready_timeout(Duration::from_secs(2))
            .with_cql_version("3.4.5")
            .with_trace_frames(true);
        assert_eq!(config.addr(), "db.internal:19042");
        assert_eq!(config.ready_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.cql_version, "3.4.5");
        assert!(config.trace_frames);
    }
}
