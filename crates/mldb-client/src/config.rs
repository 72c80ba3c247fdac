// crates/mldb-client/src/config.rs
// ============================================================================
// Module: MLDB Client Configuration
// Description: Configuration loading and validation for the MLDB client.
// Purpose: Provide strict, fail-closed config parsing with env overrides.
// Dependencies: reqwest, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Client configuration is read from an optional TOML file and then
//! overridden by environment variables. Values are validated before a client
//! is built so misconfiguration fails before the first request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "mldb.toml";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Default service endpoint.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Maximum request timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 600_000;
/// Default maximum response body size.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum configurable response body size.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 256 * 1024 * 1024;
/// Default number of rows sent per `multirows` request.
const DEFAULT_ROW_BATCH_SIZE: usize = 500;
/// Maximum number of rows sent per `multirows` request.
pub(crate) const MAX_ROW_BATCH_SIZE: usize = 100_000;
/// Default user agent for outbound requests.
const DEFAULT_USER_AGENT: &str = "mldb-scenarios/0.1";

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment keys recognized by the client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEnv {
    /// Path to the TOML configuration file.
    ConfigPath,
    /// Base URL override.
    Url,
    /// Request timeout override in milliseconds.
    TimeoutMs,
}

impl ClientEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "MLDB_CONFIG",
            Self::Url => "MLDB_URL",
            Self::TimeoutMs => "MLDB_TIMEOUT_MS",
        }
    }
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// MLDB client configuration.
///
/// # Invariants
/// - `base_url` is an `http` or `https` URL without embedded credentials.
/// - `timeout_ms`, `max_response_bytes` and `row_batch_size` are non-zero and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Service endpoint, for example `http://127.0.0.1:8080`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Rows buffered per dataset before a `multirows` flush.
    #[serde(default = "default_row_batch_size")]
    pub row_batch_size: usize,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Structured log routing.
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            row_batch_size: default_row_batch_size(),
            user_agent: default_user_agent(),
            log: LogConfig::default(),
        }
    }
}

/// Destination for structured log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard all events.
    None,
}

/// Structured log configuration.
///
/// # Invariants
/// - `path` is set when `sink` is [`LogSinkKind::File`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: LogSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LogConfig {
    /// Validates sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sink == LogSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid("log.path is required for the file sink".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ClientConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// The explicit `path` wins, then `MLDB_CONFIG`, then `mldb.toml` in the
    /// working directory when present. With no file the defaults are used.
    /// Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path)? {
            Some(resolved) => Self::from_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file without env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, too large, or invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MLDB_URL` and `MLDB_TIMEOUT_MS` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is empty, not UTF-8, or malformed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = read_env_nonempty(ClientEnv::Url.as_str())? {
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = read_env_nonempty(ClientEnv::TimeoutMs.as_str())? {
            self.timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a positive integer number of milliseconds",
                    ClientEnv::TimeoutMs.as_str()
                ))
            })?;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is out of range or malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if self.row_batch_size == 0 || self.row_batch_size > MAX_ROW_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "row_batch_size must be between 1 and {MAX_ROW_BATCH_SIZE}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".to_string()));
        }
        self.log.validate()
    }

    /// Parses `base_url` and enforces scheme and credential rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is invalid.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|err| ConfigError::Invalid(format!("base_url is not a valid url: {err}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::Invalid(format!("unsupported base_url scheme: {other}")));
            }
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid("base_url must not embed credentials".to_string()));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::Invalid("base_url must include a host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "base_url must not carry a query or fragment".to_string(),
            ));
        }
        Ok(url)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default base URL.
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Default request timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default response size limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default row batch size.
const fn default_row_batch_size() -> usize {
    DEFAULT_ROW_BATCH_SIZE
}

/// Default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument, environment, or working directory.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = read_env_nonempty(ClientEnv::ConfigPath.as_str())? {
        return Ok(Some(PathBuf::from(env_path)));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(fallback.is_file().then_some(fallback))
}

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}
