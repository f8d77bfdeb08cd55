//! Application configuration, loaded from an optional `beststories.toml` and
//! the process environment (environment wins).

use crate::hn::DEFAULT_BASE_URL;
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::stories::AggregatorSettings;
use crate::web::middleware::rate_limit::RateLimitConfig;
use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Level for this crate's targets when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default = "default_upstream_timeout", deserialize_with = "deserialize_duration")]
    pub upstream_timeout: Duration,

    #[serde(default = "default_ids_cache_ttl", deserialize_with = "deserialize_duration")]
    pub ids_cache_ttl: Duration,
    #[serde(default = "default_item_cache_ttl", deserialize_with = "deserialize_duration")]
    pub item_cache_ttl: Duration,
    #[serde(default = "default_cache_sweep_interval", deserialize_with = "deserialize_duration")]
    pub cache_sweep_interval: Duration,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    #[serde(default = "default_retry_max")]
    pub retry_max: u32,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    #[serde(default = "default_breaker_cooldown", deserialize_with = "deserialize_duration")]
    pub breaker_cooldown: Duration,

    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    #[serde(default = "default_rate_limit_permits")]
    pub rate_limit_permits: u32,
    #[serde(default = "default_rate_limit_window", deserialize_with = "deserialize_duration")]
    pub rate_limit_window: Duration,
    #[serde(default = "default_rate_limit_queue")]
    pub rate_limit_queue: usize,
}

impl Config {
    /// Load from `beststories.toml` (if present) overlaid with raw environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("beststories.toml"))
                .merge(Env::raw()),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("Failed to load config")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max)
    }

    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_threshold.max(1),
            break_duration: self.breaker_cooldown,
        }
    }

    pub fn aggregator(&self) -> AggregatorSettings {
        AggregatorSettings {
            ids_ttl: self.ids_cache_ttl,
            item_ttl: self.item_cache_ttl,
            max_concurrent_fetches: self.fetch_concurrency,
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            permits: self.rate_limit_permits,
            window: self.rate_limit_window,
            queue_limit: self.rate_limit_queue,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upstream_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_ids_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_item_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_cache_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_retry_max() -> u32 {
    3
}

fn default_breaker_threshold() -> u32 {
    8
}

fn default_breaker_cooldown() -> Duration {
    Duration::from_secs(15)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_rate_limit_permits() -> u32 {
    30
}

fn default_rate_limit_window() -> Duration {
    Duration::from_secs(10)
}

fn default_rate_limit_queue() -> usize {
    50
}

/// Accepts bare integers (seconds) or human strings such as `"250ms"`, `"30s"`, `"5m"`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_all_time_units()
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}
