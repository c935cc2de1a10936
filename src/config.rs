//! Configuration loaded from `~/.config/floatcast/config.toml`.
//!
//! Every field has a default, so a missing file (or a missing section)
//! yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::stream::Scenario;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub playback: PlaybackConfig,
    pub keys: KeyConfig,
    pub player: PlayerConfig,
}

/// Content API connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.floatplane.com/api".to_string(),
            user_agent: format!("floatcast/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Exponential backoff with jitter for API requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    /// Upper bound of the random multiplier added on top of 1.0.
    pub fuzz_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 600,
            backoff_factor: 2.0,
            fuzz_factor: 0.5,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let ms = self.base_delay_ms as f64 * self.backoff_factor.powi(exp);
        Duration::from_millis(ms.min(60_000.0) as u64)
    }
}

/// Stall watchdog timings and delivery preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub initial_grace_ms: u64,
    pub recheck_interval_ms: u64,
    pub max_wait_ms: u64,
    pub preferred_scenario: Option<Scenario>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_grace_ms: 8_000,
            recheck_interval_ms: 3_000,
            max_wait_ms: 30_000,
            preferred_scenario: None,
        }
    }
}

impl PlaybackConfig {
    pub fn initial_grace(&self) -> Duration {
        Duration::from_millis(self.initial_grace_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms.max(self.initial_grace_ms))
    }
}

/// Segment key bridge settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Regex identifying decryption-key requests.
    pub pattern: String,
    /// Secure key channel endpoint; key requests fail without one.
    pub endpoint: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            pattern: crate::stream::keys::DEFAULT_KEY_PATTERN.to_string(),
            endpoint: None,
        }
    }
}

/// External media player used by the CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub command: String,
    /// `best`, `worst` or a height such as `720`.
    pub quality: String,
    /// Longest gap between bytes from a media host before the read fails.
    pub read_timeout_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: "mpv".to_string(),
            quality: "best".to_string(),
            read_timeout_secs: 20,
        }
    }
}

impl PlayerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }
}

impl Config {
    /// Load from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?;

        Ok(config)
    }
}

/// Directory holding `config.toml` and `session.json`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("floatcast")
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
