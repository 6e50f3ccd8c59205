// crates/hit-dispatch-config/src/config.rs
// ============================================================================
// Module: Hit Dispatch Configuration
// Description: Configuration loading and validation for hit dispatch.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: hit-dispatch-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and defaults to the library defaults; unknown
//! keys and out-of-range values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use hit_dispatch_core::DEFAULT_BUCKET_CAPACITY;
use hit_dispatch_core::DEFAULT_BUCKET_FILL_RATE;
use hit_dispatch_core::DispatchSettings;
use hit_dispatch_core::ThrottleSettings;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "hit-dispatch.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "HIT_DISPATCH_CONFIG";
/// Maximum size of a config file in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length of a config path.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Longest accepted dispatch period (one day).
pub(crate) const MAX_DISPATCH_PERIOD_MS: u64 = 24 * 60 * 60 * 1000;
/// Longest accepted user agent.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 512;
/// Longest accepted tracker field.
pub(crate) const MAX_TRACKER_FIELD_LENGTH: usize = 256;
/// Smallest accepted bucket capacity.
pub(crate) const MIN_THROTTLE_CAPACITY: f64 = 1.0;
/// Largest accepted bucket capacity.
pub(crate) const MAX_THROTTLE_CAPACITY: f64 = 10_000.0;
/// Largest accepted fill rate in tokens per second.
pub(crate) const MAX_THROTTLE_FILL_RATE: f64 = 10_000.0;
/// Smallest accepted request or connect timeout.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Largest accepted request timeout.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Largest accepted connect timeout.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Default request timeout.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Hit dispatch configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HitDispatchConfig {
    /// Dispatch scheduling and endpoint selection.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Rate limiting for batched hits.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// HTTP transport timeouts.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Tracker defaults.
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl HitDispatchConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit path wins, then `HIT_DISPATCH_CONFIG`, then
    /// `hit-dispatch.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
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

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch.validate()?;
        self.throttle.validate()?;
        self.transport.validate()?;
        self.tracker.validate()
    }

    /// Returns the engine settings described by this configuration.
    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            dispatch_period: Duration::from_millis(self.dispatch.period_ms),
            enabled: self.dispatch.enabled,
            secure: self.dispatch.secure,
            debug_endpoint: self.dispatch.debug_endpoint,
            throttling_enabled: self.throttle.enabled,
            use_http_post: self.dispatch.use_http_post,
            bust_cache: self.dispatch.bust_cache,
            user_agent: self.dispatch.user_agent.clone(),
        }
    }

    /// Returns the token bucket parameters.
    #[must_use]
    pub const fn throttle_settings(&self) -> ThrottleSettings {
        ThrottleSettings {
            capacity: self.throttle.capacity,
            fill_rate: self.throttle.fill_rate,
        }
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// `[dispatch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Flush period in milliseconds; zero sends each hit immediately.
    pub period_ms: u64,
    /// Whether sending is enabled at startup.
    pub enabled: bool,
    /// Use the HTTPS endpoint.
    pub secure: bool,
    /// Use the validation endpoint.
    pub debug_endpoint: bool,
    /// Send hits as POST bodies instead of GET query strings.
    pub use_http_post: bool,
    /// Append a random `z` parameter to each hit.
    pub bust_cache: bool,
    /// User agent sent with each request.
    pub user_agent: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let settings = DispatchSettings::default();
        Self {
            period_ms: 0,
            enabled: settings.enabled,
            secure: settings.secure,
            debug_endpoint: settings.debug_endpoint,
            use_http_post: settings.use_http_post,
            bust_cache: settings.bust_cache,
            user_agent: settings.user_agent,
        }
    }
}

impl DispatchConfig {
    /// Validates dispatch settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms > MAX_DISPATCH_PERIOD_MS {
            return Err(ConfigError::Invalid(
                "dispatch.period_ms must not exceed one day".to_string(),
            ));
        }
        if let Some(user_agent) = &self.user_agent {
            validate_text("dispatch.user_agent", user_agent, MAX_USER_AGENT_LENGTH)?;
        }
        Ok(())
    }
}

/// `[throttle]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Whether batched hits consult the token bucket.
    pub enabled: bool,
    /// Bucket capacity in tokens.
    pub capacity: f64,
    /// Refill rate in tokens per second.
    pub fill_rate: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_BUCKET_CAPACITY,
            fill_rate: DEFAULT_BUCKET_FILL_RATE,
        }
    }
}

impl ThrottleConfig {
    /// Validates bucket parameters.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_THROTTLE_CAPACITY ..= MAX_THROTTLE_CAPACITY).contains(&self.capacity) {
            return Err(ConfigError::Invalid(
                "throttle.capacity must be between 1 and 10000".to_string(),
            ));
        }
        if !(self.fill_rate > 0.0 && self.fill_rate <= MAX_THROTTLE_FILL_RATE) {
            return Err(ConfigError::Invalid(
                "throttle.fill_rate must be greater than 0 and at most 10000".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[transport]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Total time allowed per request in milliseconds.
    pub timeout_ms: u64,
    /// Time allowed to connect in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validates timeouts.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TIMEOUT_MS ..= MAX_REQUEST_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(
                "transport.timeout_ms must be between 100 and 120000".to_string(),
            ));
        }
        if !(MIN_TIMEOUT_MS ..= MAX_CONNECT_TIMEOUT_MS).contains(&self.connect_timeout_ms) {
            return Err(ConfigError::Invalid(
                "transport.connect_timeout_ms must be between 100 and 60000".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[tracker]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Property id hits are reported to.
    pub property_id: Option<String>,
    /// Application name (`an`).
    pub app_name: Option<String>,
    /// Application version (`av`).
    pub app_version: Option<String>,
    /// Fixed anonymous client id; generated when absent.
    pub client_id: Option<String>,
    /// Anonymize sender IP addresses (`aip`).
    pub anonymize_ip: bool,
}

impl TrackerConfig {
    /// Validates tracker fields.
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("tracker.property_id", &self.property_id),
            ("tracker.app_name", &self.app_name),
            ("tracker.app_version", &self.app_version),
            ("tracker.client_id", &self.client_id),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                validate_text(field, value, MAX_TRACKER_FIELD_LENGTH)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
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

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from explicit input, environment, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a free-text field: non-empty, bounded, no control characters.
fn validate_text(field: &str, value: &str, max_length: usize) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.chars().count() > max_length {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions.")]
mod tests {
    use std::time::Duration;

    use super::HitDispatchConfig;
    use super::validate_path;
    use super::validate_text;

    #[test]
    fn empty_document_uses_library_defaults() {
        let config = HitDispatchConfig::from_toml_str("").unwrap();
        let settings = config.dispatch_settings();
        assert_eq!(settings, hit_dispatch_core::DispatchSettings::default());
        let throttle = config.throttle_settings();
        assert!((throttle.capacity - 60.0).abs() < f64::EPSILON);
        assert!((throttle.fill_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.transport.timeout(), Duration::from_secs(30));
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn validate_text_rejects_control_characters() {
        let result = validate_text("dispatch.user_agent", "agent\r\nx", 512);
        assert!(result.unwrap_err().to_string().contains("control characters"));
    }

    #[test]
    fn validate_text_counts_characters() {
        assert!(validate_text("tracker.app_name", &"é".repeat(256), 256).is_ok());
        assert!(validate_text("tracker.app_name", &"é".repeat(257), 256).is_err());
    }

    #[test]
    fn validate_path_accepts_nested_relative_path() {
        assert!(validate_path(std::path::Path::new("./conf/hit-dispatch.toml")).is_ok());
    }
}
