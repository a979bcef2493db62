//! Service configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `ANIDB_CACHE_` environment variables (`__` separates nesting, so
//! `ANIDB_CACHE_DISPATCH__MAX_RETRIES=3` sets `dispatch.max_retries`).

use crate::cache::CacheDurations;
use crate::error::{Result, ValidationError};
use crate::protocol::{CLIENT_NAME, CLIENT_VERSION, DEFAULT_PORT, DEFAULT_SERVER};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "ANIDB_CACHE_";

/// Default shared timeout of the two-transport anime race
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub dispatch: DispatchConfig,
    /// Shared timeout of the two-transport anime race, in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            dispatch: DispatchConfig::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the [`FileStore`](crate::cache::FileStore)
    pub dir: PathBuf,
    pub durations: CacheDurations,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .map(|dir| dir.join("anidb-cache"))
                .unwrap_or_else(|| PathBuf::from(".anidb-cache")),
            durations: CacheDurations::default(),
        }
    }
}

/// Send queue behaviour; pacing values are milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub server: String,
    pub port: u16,
    pub client_name: String,
    pub client_version: u32,
    /// How long to wait for one reply
    pub request_timeout_ms: u64,
    /// Timeout retries before a request fails
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
    /// Lower bound of the adaptive gap between two sends
    pub min_interval_ms: u64,
    /// Upper bound of the adaptive gap between two sends
    pub max_interval_ms: u64,
    /// How long a 555/601 reply suspends all requests, in seconds
    pub ban_cooldown_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            client_name: CLIENT_NAME.to_string(),
            client_version: CLIENT_VERSION,
            request_timeout_ms: 45_000,
            max_retries: 5,
            initial_backoff_ms: 6_000,
            max_backoff_ms: 60_000,
            backoff_factor: 1.5,
            min_interval_ms: 2_000,
            max_interval_ms: 4_000,
            ban_cooldown_secs: 30 * 60 + 1,
        }
    }
}

impl DispatchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn ban_cooldown(&self) -> Duration {
        Duration::from_secs(self.ban_cooldown_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::setting(
                "dispatch.request_timeout_ms",
                "must be greater than 0",
            )
            .into());
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(ValidationError::setting(
                "dispatch.min_interval_ms",
                "must not exceed dispatch.max_interval_ms",
            )
            .into());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::setting(
                "dispatch.initial_backoff_ms",
                "must not exceed dispatch.max_backoff_ms",
            )
            .into());
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ValidationError::setting(
                "dispatch.backoff_factor",
                "must be a finite number of at least 1.0",
            )
            .into());
        }
        if self.client_name.is_empty() {
            return Err(ValidationError::setting(
                "dispatch.client_name",
                "must not be empty",
            )
            .into());
        }
        Ok(())
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("anidb-cache").join("config.toml"))
    }

    /// Loads defaults, the default config file if it exists, and the environment
    pub fn load() -> Result<Self> {
        Self::figment(Self::default_path().as_deref()).extract_validated()
    }

    /// Like [`Config::load`] but reading the TOML file at `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::figment(Some(path)).extract_validated()
    }

    /// The layered provider: defaults < TOML file < environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = path
            && path.exists()
        {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Rejects zero timeouts and inverted bounds
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(ValidationError::setting(
                "fetch_timeout_secs",
                "must be greater than 0",
            )
            .into());
        }
        if self.cache.durations.invalid_secs == 0 {
            return Err(ValidationError::setting(
                "cache.durations.invalid_secs",
                "must be greater than 0",
            )
            .into());
        }
        self.dispatch.validate()
    }
}

trait ExtractValidated {
    fn extract_validated(self) -> Result<Config>;
}

impl ExtractValidated for Figment {
    fn extract_validated(self) -> Result<Config> {
        let config: Config = self.extract()?;
        config.validate()?;
        Ok(config)
    }
}
