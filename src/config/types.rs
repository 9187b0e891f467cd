// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// No default: an unset port fails deserialization
    pub port: u16,
    pub workers: Option<usize>,
}

/// Object storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// `fs` for a local directory, otherwise an opendal scheme such as `s3`
    pub scheme: String,
    /// Service options passed to opendal (endpoint, region, credentials)
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Directory holding one subdirectory per bucket, for the `fs` scheme
    pub root: String,
    pub bucket: String,
    /// Bytes per chunk pulled from the backend
    pub read_chunk_size: usize,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Key served for `/`
    pub index_key: String,
    pub server_name: String,
    pub enable_cors: bool,
    /// Largest body frame written per reader call
    pub write_chunk_size: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration, timeouts in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    pub header_read_timeout: u64,
    pub backend_timeout: u64,
    pub max_connections: Option<usize>,
    pub shutdown_grace_period: u64,
}

impl PerformanceConfig {
    pub const fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout)
    }

    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout)
    }

    pub const fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period)
    }
}
