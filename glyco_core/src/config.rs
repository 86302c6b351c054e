//! Configuration file support for Glyco.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/glyco/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Profile used when neither `--user` nor a remembered user is available
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user")]
    pub default_user: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default_user: default_user(),
        }
    }
}

/// Longest dashboard window accepted from configuration
pub const MAX_WINDOW_DAYS: u32 = crate::stats::MAX_DAILY_POINTS;

/// Windows shown on the dashboard
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_short_window_days")]
    pub short_window_days: u32,

    #[serde(default = "default_medium_window_days")]
    pub medium_window_days: u32,

    /// Also the window the A1c estimate is derived from
    #[serde(default = "default_long_window_days")]
    pub long_window_days: u32,

    #[serde(default = "default_trend_points")]
    pub trend_points: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            short_window_days: default_short_window_days(),
            medium_window_days: default_medium_window_days(),
            long_window_days: default_long_window_days(),
            trend_points: default_trend_points(),
        }
    }
}

impl DashboardConfig {
    /// Reject windows that would select nothing
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("short_window_days", self.short_window_days),
            ("medium_window_days", self.medium_window_days),
            ("long_window_days", self.long_window_days),
        ];
        for (name, days) in windows {
            if days == 0 {
                return Err(Error::Config(format!("dashboard.{} must be at least 1", name)));
            }
            if days > MAX_WINDOW_DAYS {
                return Err(Error::Config(format!(
                    "dashboard.{} must be at most {}",
                    name, MAX_WINDOW_DAYS
                )));
            }
        }
        if self.trend_points < 3 {
            return Err(Error::Config(
                "dashboard.trend_points must be at least 3".into(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|home| home.join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("glyco")
}

fn default_user() -> String {
    "default".into()
}

fn default_short_window_days() -> u32 {
    7
}

fn default_medium_window_days() -> u32 {
    14
}

fn default_long_window_days() -> u32 {
    30
}

fn default_trend_points() -> usize {
    crate::stats::DEFAULT_TREND_POINTS
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.dashboard.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("glyco").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
