//! Controller configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted dwell time
const MAX_DWELL_MS: u64 = 60_000;

/// Unveil configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnveilConfig {
    /// Minimum time spent in each phase, in milliseconds
    pub dwell_ms: u64,
    /// Debounced validator settings
    pub validator: ValidatorConfig,
    /// People finder settings
    pub people: PeopleConfig,
    /// HTTP collaborator settings
    pub http: HttpConfig,
}

impl UnveilConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With dwell time
    #[inline]
    #[must_use]
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell_ms = u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With validator settings
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    /// With public-record prefetch on submit
    #[inline]
    #[must_use]
    pub fn with_prefetch_public_records(mut self, prefetch: bool) -> Self {
        self.people.prefetch_public_records = prefetch;
        self
    }

    /// With backend base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = Some(base_url.into());
        self
    }

    /// Dwell time as a duration
    #[inline]
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, else as [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `ConfigError::Serialize` if the value cannot be represented
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_ms > MAX_DWELL_MS {
            return Err(ConfigError::Invalid {
                field: "dwell_ms",
                reason: format!("must be at most {MAX_DWELL_MS}"),
            });
        }
        if self.validator.debounce_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "validator.debounce_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.validator.min_length == 0 {
            return Err(ConfigError::Invalid {
                field: "validator.min_length",
                reason: "must be positive".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "http.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for UnveilConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 800,
            validator: ValidatorConfig::default(),
            people: PeopleConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Debounced validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Quiet period after the last change before a check is issued
    pub debounce_ms: u64,
    /// Values shorter than this (after trimming) are never checked
    pub min_length: usize,
}

impl ValidatorConfig {
    /// Create validator settings
    #[inline]
    #[must_use]
    pub fn new(debounce: Duration, min_length: usize) -> Self {
        Self {
            debounce_ms: u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
            min_length,
        }
    }

    /// Debounce window as a duration
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            min_length: 3,
        }
    }
}

/// People finder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleConfig {
    /// Dispatch the public-record lookup at submit instead of on phase entry
    pub prefetch_public_records: bool,
}

/// HTTP collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Backend base URL; `None` means no HTTP backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpConfig {
    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 15,
        }
    }
}
