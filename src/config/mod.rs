// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

use crate::logger::Level;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, StorageConfig,
};

/// Environment variable prefix, e.g. `RANGER_SERVER__PORT=8080`
const ENV_PREFIX: &str = "RANGER";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest precedence first: defaults, the file if present,
    /// `RANGER_*` environment variables. `server.port` has no default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("storage.scheme", "fs")?
            .set_default("storage.root", "./data")?
            .set_default("storage.bucket", "public")?
            .set_default("storage.read_chunk_size", 65_536)?
            .set_default("http.index_key", "index.html")?
            .set_default("http.server_name", "bucket-ranger")?
            .set_default("http.enable_cors", false)?
            .set_default("http.write_chunk_size", 65_536)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_default("performance.backend_timeout", 30)?
            .set_default("performance.shutdown_grace_period", 10)?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate().map_err(config::ConfigError::Message)?;
        Ok(config)
    }

    /// Reject values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be between 1 and 65535".to_string());
        }
        if self.server.workers == Some(0) {
            return Err("server.workers must be at least 1".to_string());
        }
        if self.storage.scheme.trim().is_empty() {
            return Err("storage.scheme must not be empty".to_string());
        }
        if self.storage.bucket.trim().is_empty() {
            return Err("storage.bucket must not be empty".to_string());
        }
        if self.storage.read_chunk_size == 0 {
            return Err("storage.read_chunk_size must be positive".to_string());
        }
        if self.http.write_chunk_size == 0 {
            return Err("http.write_chunk_size must be positive".to_string());
        }
        if self.http.index_key.is_empty() {
            return Err("http.index_key must not be empty".to_string());
        }
        if self.performance.backend_timeout == 0 {
            return Err("performance.backend_timeout must be positive".to_string());
        }
        self.logging.level.parse::<Level>()?;
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Small-chunk configuration serving `bucket`, for handler and server tests
#[cfg(test)]
impl Config {
    pub fn for_tests(bucket: &str) -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: None,
            },
            storage: StorageConfig {
                scheme: "fs".to_string(),
                options: std::collections::HashMap::new(),
                root: "./data".to_string(),
                bucket: bucket.to_string(),
                read_chunk_size: 8,
            },
            http: HttpConfig {
                index_key: "index.html".to_string(),
                server_name: "bucket-ranger".to_string(),
                enable_cors: false,
                write_chunk_size: 16,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                access_log: true,
                access_log_format: "common".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive: true,
                header_read_timeout: 30,
                backend_timeout: 1,
                max_connections: None,
                shutdown_grace_period: 1,
            },
        }
    }
}
