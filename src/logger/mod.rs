//! Logger module
//!
//! Provides logging utilities for the server including:
//! - Leveled diagnostics (`[DEBUG]`, `[INFO]`, `[WARN]`, `[ERROR]`)
//! - Access logging with multiple formats
//! - File-based logging support
//!
//! A [`Logger`] is built once at startup and shared through `Arc`; there is
//! no process-wide instance.

mod format;
mod writer;

pub use format::AccessLogEntry;
pub use writer::LogWriter;

#[cfg(test)]
pub use writer::LogBuffer;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config::{Config, LoggingConfig};

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag().to_ascii_lowercase())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

pub struct Logger {
    level: Level,
    access_log: bool,
    access_format: String,
    writer: LogWriter,
}

impl Logger {
    pub const fn new(level: Level, access_log: bool, access_format: String, writer: LogWriter) -> Self {
        Self {
            level,
            access_log,
            access_format,
            writer,
        }
    }

    /// Build the logger described by the `[logging]` section
    pub fn from_config(config: &LoggingConfig) -> io::Result<Self> {
        let level = config
            .level
            .parse()
            .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let writer = LogWriter::new(
            config.access_log_file.as_deref(),
            config.error_log_file.as_deref(),
        )?;
        Ok(Self::new(
            level,
            config.access_log,
            config.access_log_format.clone(),
            writer,
        ))
    }

    /// Logger writing every line to an in-memory buffer
    #[cfg(test)]
    pub fn capture(level: Level) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        let writer = LogWriter::buffered(&buffer);
        (Self::new(level, true, "common".to_string(), writer), buffer)
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn log(&self, level: Level, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let line = format!("[{}] {message}", level.tag());
        match level {
            Level::Debug | Level::Info => self.writer.write_info(&line),
            Level::Warn | Level::Error => self.writer.write_error(&line),
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    /// Log formatted access log entry
    pub fn access(&self, entry: &AccessLogEntry) {
        if self.access_log {
            self.writer.write_access(&entry.format(&self.access_format));
        }
    }

    pub fn server_start(&self, addr: &SocketAddr, config: &Config) {
        self.info("======================================");
        self.info("Range server started successfully");
        self.info(&format!("Listening on: http://{addr}"));
        let storage = &config.storage;
        if storage.scheme == crate::storage::LOCAL_SCHEME {
            self.info(&format!("Serving bucket '{}' from {}", storage.bucket, storage.root));
        } else {
            self.info(&format!("Serving {} bucket '{}'", storage.scheme, storage.bucket));
        }
        self.info(&format!("Log level: {}", self.level));
        if let Some(workers) = config.server.workers {
            self.info(&format!("Worker threads: {workers}"));
        }
        if let Some(max) = config.performance.max_connections {
            self.info(&format!("Max connections: {max}"));
        }
        if let Some(ref path) = config.logging.access_log_file {
            self.info(&format!("Access log: {path}"));
        }
        if let Some(ref path) = config.logging.error_log_file {
            self.info(&format!("Error log: {path}"));
        }
        self.info("======================================");
    }

    pub fn connection_error(&self, peer: &SocketAddr, err: &impl fmt::Display) {
        self.warn(&format!("Connection from {peer} ended with error: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!(" debug ".parse::<Level>().unwrap(), Level::Debug);
        assert!("loud".parse::<Level>().is_err());
        assert_eq!(Level::Error.to_string(), "error");
    }

    #[test]
    fn test_level_filtering() {
        let (logger, buffer) = Logger::capture(Level::Warn);
        logger.debug("hidden");
        logger.info("hidden too");
        logger.warn("careful");
        logger.error("broken");
        assert_eq!(buffer.lines(), vec!["[WARN] careful", "[ERROR] broken"]);
    }

    #[test]
    fn test_access_log_toggle() {
        let entry = AccessLogEntry::new("127.0.0.1".into(), "GET".into(), "/a".into());

        let (logger, buffer) = Logger::capture(Level::Info);
        logger.access(&entry);
        assert!(buffer.contains("\"GET /a HTTP/1.1\" 200 -"));

        let buffer = LogBuffer::default();
        let quiet = Logger::new(
            Level::Info,
            false,
            "common".to_string(),
            LogWriter::buffered(&buffer),
        );
        quiet.access(&entry);
        assert!(buffer.lines().is_empty());
    }

    #[test]
    fn test_from_config_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        };
        let err = Logger::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
