use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{anomaly::Thresholds, monitor::MonitorSettings, provider::open_meteo};

/// Where current weather comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Open-Meteo compatible base URL, without the `/v1/forecast` path.
    pub base_url: String,

    /// Request timeout. Absent means the HTTP client default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { base_url: open_meteo::DEFAULT_BASE_URL.to_string(), timeout_secs: None }
    }
}

/// How many cycles to run and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub cycles: u32,
    pub delay_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let settings = MonitorSettings::default();
        Self { cycles: settings.cycles, delay_secs: settings.delay.as_secs() }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [weather]
/// base_url = "https://api.open-meteo.com"
///
/// [thresholds]
/// inactivity_minutes = 30.0
/// route_deviation_meters = 300.0
/// precipitation_mm = 5.0
/// wind_speed_kmh = 15.0
///
/// [monitor]
/// cycles = 10
/// delay_secs = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub thresholds: Thresholds,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load config from the platform location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from `path`, or defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tourwatch", "tourwatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            cycles: self.monitor.cycles,
            delay: Duration::from_secs(self.monitor.delay_secs),
        }
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        tracing::debug!(
            base_url = %self.weather.base_url,
            timeout_secs = ?self.weather.timeout_secs,
            inactivity_minutes = self.thresholds.inactivity_minutes,
            route_deviation_meters = self.thresholds.route_deviation_meters,
            precipitation_mm = self.thresholds.precipitation_mm,
            wind_speed_kmh = self.thresholds.wind_speed_kmh,
            cycles = self.monitor.cycles,
            delay_secs = self.monitor.delay_secs,
            "configuration loaded"
        );
    }
}
