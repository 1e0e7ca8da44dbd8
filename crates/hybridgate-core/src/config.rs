//! Gateway configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional TOML
//! file, then `HYBRIDGATE_*` environment variables. The premium API key is only
//! ever read from the environment and is never serialized.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::RequestCategory;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::rate_limiter::RateLimits;

pub const CONFIG_PATH_ENV: &str = "HYBRIDGATE_CONFIG";
pub const API_KEY_ENVS: [&str; 2] = ["HYBRIDGATE_PREMIUM_API_KEY", "ATTOM_API_KEY"];

const MAX_PREMIUM_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PremiumConfig {
    /// Base URL of the metered provider. Unset means the simulated provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
            api_key: None,
        }
    }
}

impl PremiumConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_live(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

impl Debug for PremiumConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiumConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Zero disables caching.
    pub ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: None,
        }
    }
}

impl CacheConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Threads available to blocking work such as journal writes.
    pub worker_pool_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_journal: Option<PathBuf>,
    pub cache: CacheConfig,
    pub rate_limits: RateLimits,
    pub circuit_breaker: CircuitBreakerConfig,
    pub premium: PremiumConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 2,
            usage_journal: None,
            cache: CacheConfig::default(),
            rate_limits: RateLimits::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            premium: PremiumConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Full layered load against the process environment, validated.
    ///
    /// `path` wins over `HYBRIDGATE_CONFIG`; with neither, only defaults and
    /// environment overrides apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies `HYBRIDGATE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("HYBRIDGATE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("HYBRIDGATE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = var("HYBRIDGATE_CACHE_SWEEP_SECS") {
            self.cache.sweep_interval_secs = Some(parse_env("HYBRIDGATE_CACHE_SWEEP_SECS", &value)?);
        }
        if let Some(value) = var("HYBRIDGATE_PREMIUM_MONTHLY_CAP") {
            self.rate_limits.premium_monthly = parse_env("HYBRIDGATE_PREMIUM_MONTHLY_CAP", &value)?;
        }
        if let Some(value) = var("HYBRIDGATE_BREAKER_FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold =
                parse_env("HYBRIDGATE_BREAKER_FAILURE_THRESHOLD", &value)?;
        }
        if let Some(value) = var("HYBRIDGATE_BREAKER_RESET_SECS") {
            self.circuit_breaker.reset_timeout =
                Duration::from_secs(parse_env("HYBRIDGATE_BREAKER_RESET_SECS", &value)?);
        }
        if let Some(value) = var("HYBRIDGATE_PREMIUM_TIMEOUT_SECS") {
            self.premium.timeout_secs = parse_env("HYBRIDGATE_PREMIUM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = var("HYBRIDGATE_PREMIUM_BASE_URL") {
            self.premium.base_url = Some(value);
        }
        if let Some(value) = var("HYBRIDGATE_WORKER_POOL_SIZE") {
            self.worker_pool_size = parse_env("HYBRIDGATE_WORKER_POOL_SIZE", &value)?;
        }
        if let Some(value) = var("HYBRIDGATE_USAGE_JOURNAL") {
            self.usage_journal = Some(PathBuf::from(value));
        }
        if let Some(key) = API_KEY_ENVS.into_iter().find_map(var) {
            self.premium.api_key = Some(key);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in RequestCategory::ALL {
            if self.rate_limits.cap(category) == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate limit for {category} must be > 0"
                )));
            }
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(String::from(
                "circuit_breaker.failure_threshold must be > 0",
            )));
        }
        if self.circuit_breaker.reset_timeout.is_zero() {
            return Err(ConfigError::Invalid(String::from(
                "circuit_breaker.reset_timeout_secs must be > 0",
            )));
        }
        if !(1..=MAX_PREMIUM_TIMEOUT_SECS).contains(&self.premium.timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "premium.timeout_secs must be between 1 and {MAX_PREMIUM_TIMEOUT_SECS}"
            )));
        }
        if self.worker_pool_size == 0 {
            return Err(ConfigError::Invalid(String::from(
                "worker_pool_size must be > 0",
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}
