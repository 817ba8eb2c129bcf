//! Configuration parsing and validation for the relay server
//!
//! This module handles command-line and environment parsing using clap. The resulting
//! [`Config`] is built once at startup and turned into the [`UpstreamConfig`] that is
//! injected into the handlers.
use anyhow::anyhow;
use clap::Parser;
use std::time::Duration;
use url::Url;
use wortschatz::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, UpstreamConfig};

#[derive(Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay server will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// The Gemini API key. When missing the server still starts, but every enrichment
    /// request fails with a configuration error.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// The Gemini model used for generation.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the generative language API.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: Url,

    /// Upper bound (in seconds) on a single upstream call.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, default_value_t = false)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "wortschatz")]
    pub metrics_prefix: String,

    /// Maximum number of idle HTTP connections to keep alive towards the upstream.
    #[arg(long, default_value_t = 16)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

// The api key must never end up in the startup log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("metrics_port", &self.metrics_port)
            .field("metrics", &self.metrics)
            .field("metrics_prefix", &self.metrics_prefix)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_secs", &self.pool_idle_timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.upstream_timeout_secs == 0 {
            return Err(anyhow!("Upstream timeout must be at least one second"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("Model name must not be empty"));
        }
        if self.metrics && self.metrics_port == self.port {
            return Err(anyhow!(
                "Metrics port {} clashes with the server port",
                self.metrics_port
            ));
        }
        Ok(self)
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig::builder()
            .base_url(self.base_url.clone())
            .model(self.model.clone())
            .maybe_api_key(self.api_key.clone())
            .timeout(Duration::from_secs(self.upstream_timeout_secs))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("wortschatz").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let config = parse(&["--api-key", "k", "--model", DEFAULT_MODEL])
            .validate()
            .unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!config.metrics);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(parse(&["--upstream-timeout-secs", "0"]).validate().is_err());
    }

    #[test]
    fn test_metrics_port_clash_rejected() {
        let config = parse(&["-m", "--port", "9000", "--metrics-port", "9000"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = parse(&["--api-key", "super-secret"]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_upstream_carries_settings() {
        let upstream = parse(&["--api-key", "k", "--upstream-timeout-secs", "5"]).upstream();
        assert_eq!(upstream.api_key.as_deref(), Some("k"));
        assert_eq!(upstream.timeout, Duration::from_secs(5));
    }
}
