//! Configuration management for Chaser-Page

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser-level CDP WebSocket endpoint
    pub cdp_endpoint: String,

    /// Highlight driver activity in the page (mouse tracer, overlays)
    pub trace: bool,

    /// Initial backoff of the evaluation retry loop in milliseconds
    pub eval_backoff_initial_ms: u64,

    /// Backoff ceiling of the evaluation retry loop in milliseconds
    pub eval_backoff_max_ms: u64,

    /// Initial interval of the page sleeper in milliseconds
    pub sleeper_initial_ms: u64,

    /// Ceiling of the page sleeper in milliseconds
    pub sleeper_max_ms: u64,

    /// Default timeout for transport commands in milliseconds
    pub default_timeout: u64,

    /// User agent applied by `Page::set_user_agent(None)`
    pub user_agent: String,

    /// Accept-Language applied together with the default user agent
    pub accept_language: String,

    /// Platform applied together with the default user agent
    pub platform: String,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp_endpoint: "ws://localhost:9222".to_string(),
            trace: false,
            eval_backoff_initial_ms: 30,
            eval_backoff_max_ms: 3000,
            sleeper_initial_ms: 100,
            sleeper_max_ms: 1000,
            default_timeout: 30000,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/81.0.4044.138 Safari/537.36"
                .to_string(),
            accept_language: "en".to_string(),
            platform: "MacIntel".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = env::var("CHASER_CDP_ENDPOINT") {
            config.cdp_endpoint = endpoint;
        }

        if let Ok(trace) = env::var("CHASER_TRACE") {
            config.trace = trace
                .parse()
                .map_err(|_| Error::configuration("Invalid CHASER_TRACE"))?;
        }

        if let Ok(initial) = env::var("CHASER_EVAL_BACKOFF_INITIAL_MS") {
            config.eval_backoff_initial_ms = initial
                .parse()
                .map_err(|_| Error::configuration("Invalid CHASER_EVAL_BACKOFF_INITIAL_MS"))?;
        }

        if let Ok(max) = env::var("CHASER_EVAL_BACKOFF_MAX_MS") {
            config.eval_backoff_max_ms = max
                .parse()
                .map_err(|_| Error::configuration("Invalid CHASER_EVAL_BACKOFF_MAX_MS"))?;
        }

        if let Ok(timeout) = env::var("CHASER_DEFAULT_TIMEOUT") {
            config.default_timeout = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid CHASER_DEFAULT_TIMEOUT"))?;
        }

        if let Ok(user_agent) = env::var("CHASER_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(log_level) = env::var("CHASER_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout == 0 {
            return Err(Error::configuration("default_timeout must be positive"));
        }
        if self.eval_backoff_initial_ms > self.eval_backoff_max_ms {
            return Err(Error::configuration(
                "eval_backoff_initial_ms exceeds eval_backoff_max_ms",
            ));
        }
        if self.sleeper_initial_ms > self.sleeper_max_ms {
            return Err(Error::configuration("sleeper_initial_ms exceeds sleeper_max_ms"));
        }
        Ok(())
    }

    pub fn eval_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.eval_backoff_initial_ms),
            Duration::from_millis(self.eval_backoff_max_ms),
        )
    }

    pub fn sleeper(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.sleeper_initial_ms),
            Duration::from_millis(self.sleeper_max_ms),
        )
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout)
    }
}
