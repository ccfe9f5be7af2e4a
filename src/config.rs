use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Where rates are scraped from and which pair we track.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_from_currency")]
    pub from_currency: String,
    #[serde(default = "default_to_currency")]
    pub to_currency: String,
    /// Numbers outside this band are skipped when scanning the page, so
    /// table ordinals and amounts are not mistaken for the rate.
    #[serde(default = "default_min_plausible_rate")]
    pub min_plausible_rate: f64,
    #[serde(default = "default_max_plausible_rate")]
    pub max_plausible_rate: f64,
}

fn default_base_url() -> String {
    "https://www.xe.com".to_string()
}

fn default_from_currency() -> String {
    "USD".to_string()
}

fn default_to_currency() -> String {
    "CAD".to_string()
}

fn default_min_plausible_rate() -> f64 {
    0.5
}

fn default_max_plausible_rate() -> f64 {
    2.5
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            base_url: default_base_url(),
            from_currency: default_from_currency(),
            to_currency: default_to_currency(),
            min_plausible_rate: default_min_plausible_rate(),
            max_plausible_rate: default_max_plausible_rate(),
        }
    }
}

/// Request pacing knobs. Milliseconds so tests can run with near-zero delays.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PacingConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Requests allowed before an extended cooldown kicks in.
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
    #[serde(default = "default_burst_cooldown_ms")]
    pub burst_cooldown_ms: u64,
    /// Upper bound of the sub-second jitter added on top of every delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_min_delay_ms() -> u64 {
    2500
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_burst_limit() -> u32 {
    5
}

fn default_burst_cooldown_ms() -> u64 {
    20_000
}

fn default_jitter_ms() -> u64 {
    750
}

impl PacingConfig {
    /// Rejects impossible delay bounds up front, before a scrape starts.
    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            anyhow::bail!(
                "pacing.min_delay_ms ({}) must not exceed pacing.max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        Ok(())
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            burst_limit: default_burst_limit(),
            burst_cooldown_ms: default_burst_cooldown_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

fn default_max_range_days() -> i64 {
    90
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            source: SourceConfig::default(),
            pacing: PacingConfig::default(),
            max_range_days: default_max_range_days(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file found, using defaults");
            return Ok(AppConfig::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxscrape", "fxscrape")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .pacing
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
