//! Configuration management for dimscope
//!
//! Config stored at: ~/.config/dimscope/config.json

use std::path::{Path, PathBuf};
use std::time::Duration;

use dimscope_detect::DetectorConfig;
use dimscope_types::{ConfigError, OutputFormat, Result};
use serde::{Deserialize, Serialize};

/// Overrides `detector_url` when set
pub const DETECTOR_URL_ENV: &str = "DIMSCOPE_DETECTOR_URL";

/// Record API listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Header carrying the user id asserted by the identity provider
    #[serde(default = "default_owner_header")]
    pub owner_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            owner_header: default_owner_header(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the detection service
    #[serde(default = "default_detector_url")]
    pub detector_url: String,

    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Measure request bound; unset keeps the transport default
    #[serde(default)]
    pub measure_timeout_secs: Option<u64>,

    /// Retries of measure after transport failures
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Store directory override
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Keep the (annotated) image with each saved measurement
    #[serde(default = "default_true")]
    pub save_images: bool,

    /// User id the CLI acts as when --owner is not given
    #[serde(default)]
    pub default_owner: Option<String>,

    /// Default output format (json, table)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Unit appended to the average size
    #[serde(default = "default_unit_suffix")]
    pub unit_suffix: String,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_detector_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_health_timeout_secs() -> u64 {
    3
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_unit_suffix() -> String {
    "cm".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_owner_header() -> String {
    "x-user-id".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector_url: default_detector_url(),
            health_timeout_secs: default_health_timeout_secs(),
            measure_timeout_secs: None,
            retry_count: 0,
            retry_interval_ms: default_retry_interval_ms(),
            store_dir: None,
            save_images: true,
            default_owner: None,
            output_format: default_output_format(),
            unit_suffix: default_unit_suffix(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("dimscope");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the measurement store directory
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("dimscope");
        Ok(data_dir)
    }

    /// Load config from file, or create default, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DETECTOR_URL_ENV) {
            if !url.trim().is_empty() {
                self.detector_url = url.trim().to_string();
            }
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::default()
            .with_base_url(self.detector_url.clone())
            .with_health_timeout(Duration::from_secs(self.health_timeout_secs.max(1)))
            .with_measure_timeout(self.measure_timeout_secs.map(Duration::from_secs))
            .with_retries(
                self.retry_count,
                Duration::from_millis(self.retry_interval_ms),
            )
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "dimscope Configuration")?;
        writeln!(f, "======================")?;
        writeln!(f)?;
        writeln!(f, "Detector URL:    {}", self.detector_url)?;
        writeln!(f, "Health timeout:  {}s", self.health_timeout_secs)?;
        writeln!(
            f,
            "Measure timeout: {}",
            self.measure_timeout_secs
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "(transport default)".to_string())
        )?;
        writeln!(f, "Retries:         {} ({}ms apart)", self.retry_count, self.retry_interval_ms)?;
        writeln!(
            f,
            "Store dir:       {}",
            self.store_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        )?;
        writeln!(f, "Save images:     {}", self.save_images)?;
        writeln!(
            f,
            "Default owner:   {}",
            self.default_owner.as_deref().unwrap_or("(none)")
        )?;
        writeln!(f, "Output format:   {}", self.output_format)?;
        writeln!(f, "Unit suffix:     {}", self.unit_suffix)?;
        writeln!(
            f,
            "Server:          {}:{} (identity header: {})",
            self.server.host, self.server.port, self.server.owner_header
        )?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:     {}", path.display())?;
        }

        Ok(())
    }
}
