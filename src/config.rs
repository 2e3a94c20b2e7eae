//! Configuration for the cadence agent.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::device::UnlockMethod;
use crate::schedule::SchoolProfile;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Behavioral template driving the daily schedule
    pub profile: SchoolProfile,

    /// How sessions unlock the device
    pub unlock: UnlockMethod,

    /// IANA timezone the schedule is evaluated in; host-local when unset
    pub timezone: Option<String>,

    /// Path to the adb binary
    pub adb_path: PathBuf,

    /// Device serial for multi-device hosts
    pub device_serial: Option<String>,

    /// External classifier command line (program + args); sessions only
    /// scroll when unset
    pub classifier_command: Option<Vec<String>>,

    /// Custom label vocabulary; built-in set when unset
    pub labels: Option<Vec<String>>,

    /// Confidence a label must exceed before a session acts on it
    pub threshold: f64,

    /// Scheduler poll interval
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Keep-alive ping interval
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Window match tolerance in minutes
    pub tolerance_minutes: u64,

    /// How long shutdown waits for loops to exit
    #[serde(with = "duration_serde")]
    pub shutdown_grace: Duration,

    /// Path for persisted state (label counts)
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cadence-agent");

        Self {
            profile: SchoolProfile::University,
            unlock: UnlockMethod::default(),
            timezone: None,
            adb_path: PathBuf::from("adb"),
            device_serial: None,
            classifier_command: None,
            labels: None,
            threshold: crate::decision::DEFAULT_THRESHOLD,
            poll_interval: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(120),
            tolerance_minutes: 5,
            shutdown_grace: Duration::from_secs(30),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cadence-agent")
            .join("config.json")
    }

    /// Where cumulative label counts are persisted.
    pub fn counts_path(&self) -> PathBuf {
        self.data_path.join("label_counts.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Parse the configured timezone, if any.
    pub fn effective_timezone(&self) -> Result<Option<Tz>, ConfigError> {
        match &self.timezone {
            None => Ok(None),
            Some(name) => Tz::from_str(name)
                .map(Some)
                .map_err(|e| ConfigError::ParseError(format!("invalid timezone '{name}': {e}"))),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.profile, SchoolProfile::University);
        assert_eq!(config.unlock, UnlockMethod::Swipe);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.tolerance_minutes, 5);
        assert!(config.classifier_command.is_none());
        assert!(config.effective_timezone().unwrap().is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config {
            profile: SchoolProfile::PrimarySchool,
            unlock: UnlockMethod::Pin("4812".to_string()),
            timezone: Some("Europe/Lisbon".to_string()),
            ..Config::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.profile, SchoolProfile::PrimarySchool);
        assert_eq!(back.unlock, UnlockMethod::Pin("4812".to_string()));
        assert_eq!(
            back.effective_timezone().unwrap(),
            Some(chrono_tz::Europe::Lisbon)
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"profile": "high_school"}"#).unwrap();
        assert_eq!(config.profile, SchoolProfile::HighSchool);
        assert_eq!(config.keepalive_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let config = Config {
            timezone: Some("Mars/Olympus".to_string()),
            ..Config::default()
        };
        assert!(config.effective_timezone().is_err());
    }
}
