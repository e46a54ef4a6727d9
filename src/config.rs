use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TrackerError;
use crate::logging::LogConfig;
use crate::runs::RunDetectorConfig;
use crate::source::SubscriptionOptions;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Run detection thresholds
    #[serde(default)]
    pub detector: RunDetectorConfig,

    /// Location subscription settings
    #[serde(default)]
    pub source: SubscriptionOptions,

    /// Where completed sessions are stored
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging preferences
    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Session storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the session file
    pub data_dir: PathBuf,

    /// Session file name inside `data_dir`
    pub sessions_file: String,
}

impl StorageSettings {
    pub fn sessions_path(&self) -> PathBuf {
        self.data_dir.join(&self.sessions_file)
    }
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: "1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("slopetrack"),
            sessions_file: "sessions.json".to_string(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            metadata: ConfigMetadata::default(),
            detector: RunDetectorConfig::default(),
            source: SubscriptionOptions::default(),
            storage: StorageSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl TrackerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: TrackerConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slopetrack")
            .join("config.toml")
    }

    /// Load the configuration for the CLI.
    ///
    /// An explicit path must exist and be valid. Without one, the default path
    /// is used and a missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_if_present(Self::default_config_path()),
        }
    }

    /// Load configuration, falling back to defaults only when the file does not exist
    pub fn load_if_present<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::metadata(&path) {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.as_ref().display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            _ => Self::load_from_file(path),
        }
    }

    /// Reject thresholds the detector cannot work with
    pub fn validate(&self) -> std::result::Result<(), TrackerError> {
        let detector = &self.detector;
        if detector.descent_trigger_m <= 0.0 {
            return Err(TrackerError::Configuration(
                "detector.descent_trigger_m must be positive".to_string(),
            ));
        }
        if detector.climb_exit_m <= 0.0 {
            return Err(TrackerError::Configuration(
                "detector.climb_exit_m must be positive".to_string(),
            ));
        }
        if detector.stall_samples == 0 {
            return Err(TrackerError::Configuration(
                "detector.stall_samples must be at least 1".to_string(),
            ));
        }
        if detector.min_vertical_drop_m < 0.0 {
            return Err(TrackerError::Configuration(
                "detector.min_vertical_drop_m must not be negative".to_string(),
            ));
        }
        if self.source.min_distance_m < 0.0 {
            return Err(TrackerError::Configuration(
                "source.min_distance_m must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
