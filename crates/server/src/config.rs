use artidash_engine::{ClampPolicy, StalePolicy};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Clamp {
    /// Pin cooldown and skill percentages to 0..=100.
    Clamped,
    /// Report raw ratios, including negative values after expiry.
    Unclamped,
}

impl From<Clamp> for ClampPolicy {
    fn from(value: Clamp) -> Self {
        match value {
            Clamp::Clamped => ClampPolicy::Clamped,
            Clamp::Unclamped => ClampPolicy::Unclamped,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "artidash",
    version,
    about = "Live dashboard for game characters and the shared bank, fed by a server-push stream"
)]
pub struct Config {
    /// Base URL of the producer.
    #[arg(long, env = "ARTIDASH_UPSTREAM", default_value = "http://127.0.0.1:3000")]
    pub upstream: String,

    /// Path of the event stream on the producer.
    #[arg(long, env = "ARTIDASH_EVENTS_PATH", default_value = "/events")]
    pub events_path: String,

    /// Where the read API listens.
    #[arg(long, env = "ARTIDASH_BIND", default_value = "127.0.0.1:39334")]
    pub bind: SocketAddr,

    /// Progress sampling interval in milliseconds.
    #[arg(long, env = "ARTIDASH_SAMPLE_MS", default_value_t = 400)]
    pub sample_ms: u64,

    #[arg(long, env = "ARTIDASH_CLAMP", value_enum, default_value_t = Clamp::Clamped)]
    pub clamp: Clamp,

    /// Drop characters the producer has not mentioned for this many seconds.
    /// Unset keeps them forever.
    #[arg(long, env = "ARTIDASH_EVICT_AFTER_SECS")]
    pub evict_after_secs: Option<u64>,

    /// First reconnect delay in milliseconds; doubles up to --retry-max-ms.
    #[arg(long, env = "ARTIDASH_RETRY_START_MS", default_value_t = 500)]
    pub retry_start_ms: u64,

    #[arg(long, env = "ARTIDASH_RETRY_MAX_MS", default_value_t = 30_000)]
    pub retry_max_ms: u64,

    /// tracing filter directive, e.g. `info,artidash_server=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    pub fn stream_url(&self) -> anyhow::Result<Url> {
        let base = Url::parse(&self.upstream)
            .map_err(|e| anyhow::anyhow!("invalid upstream url {:?}: {e}", self.upstream))?;
        let url = base
            .join(&self.events_path)
            .map_err(|e| anyhow::anyhow!("invalid events path {:?}: {e}", self.events_path))?;
        Ok(url)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_ms.max(10))
    }

    pub fn stale_policy(&self) -> StalePolicy {
        match self.evict_after_secs {
            Some(secs) => StalePolicy::EvictAfter(Duration::from_secs(secs)),
            None => StalePolicy::Keep,
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            start: Duration::from_millis(self.retry_start_ms),
            max: Duration::from_millis(self.retry_max_ms.max(self.retry_start_ms)),
        }
    }
}

/// Reconnect backoff handed to the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub start: Duration,
    pub max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            start: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}
