//! Configuration management for mongoview
//!
//! Configuration is assembled from, in order of increasing precedence:
//! 1. Default values
//! 2. A TOML configuration file (`~/.mongoview/config.toml` by default)
//! 3. `MONGOVIEW_*` environment variables
//! 4. Command-line arguments (applied by the CLI layer)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::codec::{CharacterEncoding, JsonMode};
use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Display and pagination configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Query history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Export/import configuration
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Default MongoDB connection URI
    #[serde(default = "default_uri")]
    pub default_uri: String,

    /// Database used when the URI names none
    #[serde(default = "default_database")]
    pub database: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum pool size
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Minimum pool size
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Pagination and output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Documents per page for new cursors
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u64,

    /// Page sizes offered to users; any positive size is accepted
    #[serde(default = "default_allowed_page_sizes")]
    pub allowed_page_sizes: Vec<u64>,

    /// Pretty-print documents
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Enable colored output
    #[serde(default = "default_color_output")]
    pub color_output: bool,

    /// Indentation width for pretty output
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Query history configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of history entries
    #[serde(default = "default_max_history_size")]
    pub max_size: usize,
}

/// Export and import defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Character encoding name for files
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Wrap exported documents in a single JSON array
    #[serde(default)]
    pub json_array: bool,

    /// Extended JSON flavour written on export
    #[serde(default)]
    pub json_mode: JsonMode,

    /// Documents fetched per batch while streaming an export
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Show a progress bar during export/import
    #[serde(default = "default_progress")]
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "test".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_min_pool_size() -> u32 {
    0
}

fn default_app_name() -> String {
    "mongoview".to_string()
}

fn default_items_per_page() -> u64 {
    20
}

fn default_allowed_page_sizes() -> Vec<u64> {
    vec![10, 20, 50, 100]
}

fn default_pretty() -> bool {
    true
}

fn default_color_output() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

fn default_max_history_size() -> usize {
    100
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_batch_size() -> u32 {
    1000
}

fn default_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_uri: default_uri(),
            database: default_database(),
            timeout: default_timeout(),
            max_pool_size: default_max_pool_size(),
            min_pool_size: default_min_pool_size(),
            app_name: default_app_name(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            items_per_page: default_items_per_page(),
            allowed_page_sizes: default_allowed_page_sizes(),
            pretty: default_pretty(),
            color_output: default_color_output(),
            indent: default_indent(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_history_size(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            json_array: false,
            json_mode: JsonMode::default(),
            batch_size: default_batch_size(),
            progress: default_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
            _ => ConfigError::InvalidFormat(format!("{}: {e}", path.display())),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration with full precedence: file (if present), then environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    debug!("Loading configuration from {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MONGOVIEW_*` overrides read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps the process environment out of tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("MONGOVIEW_URI") {
            self.connection.default_uri = uri;
        }
        if let Some(db) = lookup("MONGOVIEW_DATABASE") {
            self.connection.database = db;
        }
        if let Some(value) = lookup("MONGOVIEW_ITEMS_PER_PAGE") {
            self.display.items_per_page =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "display.items_per_page".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(encoding) = lookup("MONGOVIEW_ENCODING") {
            self.transfer.encoding = encoding;
        }
        if let Some(level) = lookup("MONGOVIEW_LOG_LEVEL") {
            self.logging.level = LogLevel::from_name(&level).ok_or(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: level.clone(),
            })?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mongoview")
            .join("config.toml")
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = self.to_toml_string()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Serialize configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, value: String| -> Result<()> {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }
            .into())
        };

        if !self.connection.default_uri.starts_with("mongodb://")
            && !self.connection.default_uri.starts_with("mongodb+srv://")
        {
            return invalid("connection.default_uri", self.connection.default_uri.clone());
        }
        if self.connection.min_pool_size > self.connection.max_pool_size {
            return invalid(
                "connection.min_pool_size",
                self.connection.min_pool_size.to_string(),
            );
        }
        if self.display.items_per_page == 0 {
            return invalid("display.items_per_page", "0".to_string());
        }
        if let Some(size) = self.display.allowed_page_sizes.iter().find(|s| **s == 0) {
            return invalid("display.allowed_page_sizes", size.to_string());
        }
        if self.history.max_size == 0 {
            return invalid("history.max_size", "0".to_string());
        }
        if self.transfer.batch_size == 0 {
            return invalid("transfer.batch_size", "0".to_string());
        }
        if CharacterEncoding::from_name(&self.transfer.encoding).is_err() {
            return invalid("transfer.encoding", self.transfer.encoding.clone());
        }
        Ok(())
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout)
    }

    /// Resolve the configured transfer encoding
    pub fn transfer_encoding(&self) -> Result<CharacterEncoding> {
        CharacterEncoding::from_name(&self.transfer.encoding).map_err(Into::into)
    }
}

impl LogLevel {
    /// Parse a level name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
