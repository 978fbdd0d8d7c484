//! Configuration module for persistent settings.
//!
//! This module handles loading, saving, and validating daemon configuration.
//! All values are startup-time; the sampling loop never re-reads the file.

use crate::error::ConfigError;
use crate::gamma::CorrectionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Daemon configuration with the documented defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Light controller endpoint receiving the JSON state updates.
    pub url: String,
    /// Sampling cadence in ticks per second.
    pub sample_rate_hz: f64,
    /// Stride between sampled pixels along each axis.
    pub scale_factor: u32,
    /// Exponent for the power-law correction curve.
    pub gamma: f64,
    /// Per-channel delta a color must exceed to be transmitted.
    pub change_threshold: u8,
    /// Gamma correction strategy.
    pub correction: CorrectionMode,
    /// Upper bound on each POST to the controller, in milliseconds.
    pub http_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://leds.local/json/state".to_string(),
            sample_rate_hz: 30.0,
            scale_factor: 10,
            gamma: 1.8,
            change_threshold: 5,
            correction: CorrectionMode::Tabulated,
            http_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "url must not be empty".to_string(),
            ));
        }

        if reqwest::Url::parse(&self.url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "url '{}' is not a valid URL",
                self.url
            )));
        }

        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "sample_rate_hz ({}) must be a positive number",
                self.sample_rate_hz
            )));
        }

        if self.sample_rate_hz > 240.0 {
            return Err(ConfigError::ValidationError(format!(
                "sample_rate_hz ({}) must not exceed 240",
                self.sample_rate_hz
            )));
        }

        if self.scale_factor == 0 {
            return Err(ConfigError::ValidationError(
                "scale_factor must be at least 1".to_string(),
            ));
        }

        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "gamma ({}) must be a positive number",
                self.gamma
            )));
        }

        if self.change_threshold == u8::MAX {
            return Err(ConfigError::ValidationError(
                "change_threshold of 255 would suppress every update".to_string(),
            ));
        }

        if self.http_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "http_timeout_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Sleep interval between ticks derived from the sampling rate.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate_hz)
    }

    /// Request timeout for the controller POSTs.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Configuration manager with file I/O.
pub struct ConfigManager {
    config: RwLock<Config>,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                ConfigError::ParseError(format!("failed to read config file: {}", e))
            })?;

            let config: Config = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(format!("invalid JSON: {}", e)))?;

            config.validate()?;
            config
        } else {
            Config::default()
        };

        Ok(Self {
            config: RwLock::new(config),
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config = self
            .config
            .read()
            .map_err(|_| ConfigError::ValidationError("failed to acquire read lock".to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic write: write to temp file, then rename.
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&*config)
            .map_err(|e| ConfigError::ParseError(format!("failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Get current configuration.
    pub fn get(&self) -> Config {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|_| Config::default())
    }

    /// Update configuration with validation and persist it.
    pub fn update(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;

        let mut current = self
            .config
            .write()
            .map_err(|_| ConfigError::ValidationError("failed to acquire write lock".to_string()))?;

        *current = config;
        drop(current);

        self.save()
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the default config path (`<config_dir>/glowsync/config.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("glowsync")
            .join("config.json")
    }
}

// Custom serialization for CorrectionMode so the config file reads as a
// plain lowercase word.
impl Serialize for CorrectionMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            CorrectionMode::Computed => "computed",
            CorrectionMode::Tabulated => "tabulated",
            CorrectionMode::HandTuned => "hand_tuned",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for CorrectionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "computed" => Ok(CorrectionMode::Computed),
            "tabulated" => Ok(CorrectionMode::Tabulated),
            "hand_tuned" => Ok(CorrectionMode::HandTuned),
            _ => Err(serde::de::Error::custom(format!(
                "invalid correction mode: {}, expected one of: computed, tabulated, hand_tuned",
                s
            ))),
        }
    }
}
