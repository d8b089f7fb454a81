//! Configuration loaded once at startup and passed to constructors.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::video::PROGRESS_CAP;

pub const DEFAULT_API_BASE_URL: &str = "https://api.twelvelabs.io/v1.3";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Service configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Twelve Labs API base URL
    pub api_base_url: String,
    /// Twelve Labs API key, sent as `x-api-key`
    pub api_key: String,
    /// Index that uploads are submitted to and searches run against
    pub index_id: String,
    /// Redis connection URL; records are kept in memory when unset
    pub redis_url: Option<String>,
    /// Staging directory for uploads before they are forwarded
    pub upload_dir: PathBuf,
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let mut poll = PollConfig::default();
        if let Some(value) = lookup("POLL_MAX_ATTEMPTS") {
            poll.max_attempts = match value.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "POLL_MAX_ATTEMPTS",
                        value,
                    })
                }
            };
        }

        Ok(Self {
            addr: lookup("ADDR").unwrap_or_else(|| String::from("127.0.0.1")),
            port: lookup("PORT").unwrap_or_else(|| String::from("3001")),
            api_base_url: lookup("TWELVE_LABS_BASE_URL")
                .unwrap_or_else(|| String::from(DEFAULT_API_BASE_URL)),
            api_key: required("TWELVE_LABS_API_KEY")?,
            index_id: required("TWELVE_LABS_INDEX_ID")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.is_empty()),
            upload_dir: PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| String::from("./uploads"))),
            poll,
        })
    }
}

/// Timing and budget for status polling.
///
/// Progress polls ramp linearly; transport-error retries back off
/// exponentially. Both share `max_attempts`.
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub max_attempts: u32,
    /// Delay before the second progress poll
    pub poll_initial: Duration,
    /// Added to the progress delay per attempt
    pub poll_step: Duration,
    pub poll_max: Duration,
    /// Delay after the first transport error
    pub retry_initial: Duration,
    pub retry_multiplier: f64,
    pub retry_max: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            poll_initial: Duration::from_secs(2),
            poll_step: Duration::from_millis(100),
            poll_max: Duration::from_secs(10),
            retry_initial: Duration::from_secs(2),
            retry_multiplier: 2.0,
            retry_max: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// Delay before the next poll after `attempt` still-processing answers.
    pub fn progress_delay(&self, attempt: u32) -> Duration {
        let ramp = self.poll_step.saturating_mul(attempt);
        self.poll_initial.saturating_add(ramp).min(self.poll_max)
    }

    /// Delay before retrying after the `attempt`-th lookup failed in transport.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.retry_initial.as_millis() as f64 * self.retry_multiplier.powi(exponent);
        if !ms.is_finite() || ms >= self.retry_max.as_millis() as f64 {
            return self.retry_max;
        }
        Duration::from_millis(ms as u64)
    }

    /// Advisory progress after `attempt` lookups.
    pub fn progress_percent(&self, attempt: u32) -> u8 {
        let percent = u64::from(attempt) * 100 / u64::from(self.max_attempts.max(1));
        percent.min(u64::from(PROGRESS_CAP)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn progress_delay_ramps_linearly_and_caps() {
        let config = PollConfig::default();
        assert_eq!(config.progress_delay(0), Duration::from_secs(2));
        assert_eq!(config.progress_delay(1), Duration::from_millis(2100));
        assert_eq!(config.progress_delay(50), Duration::from_secs(7));
        assert_eq!(config.progress_delay(80), Duration::from_secs(10));
        assert_eq!(config.progress_delay(119), Duration::from_secs(10));
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let config = PollConfig::default();
        let expected = [2, 4, 8, 16, 30, 30, 30];
        for (i, &secs) in expected.iter().enumerate() {
            assert_eq!(config.retry_delay(i as u32 + 1), Duration::from_secs(secs));
        }
        assert_eq!(config.retry_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn progress_percent_stays_below_complete() {
        let config = PollConfig::default();
        assert_eq!(config.progress_percent(0), 0);
        assert_eq!(config.progress_percent(60), 50);
        assert_eq!(config.progress_percent(119), 95);
        assert_eq!(config.progress_percent(500), 95);
    }

    #[test]
    fn loads_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("TWELVE_LABS_API_KEY", "key"),
            ("TWELVE_LABS_INDEX_ID", "idx"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1");
        assert_eq!(config.port, "3001");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.redis_url.is_none());
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    fn requires_api_key() {
        let err = Config::from_lookup(lookup_from(&[("TWELVE_LABS_INDEX_ID", "idx")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TWELVE_LABS_API_KEY")));
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = Config::from_lookup(lookup_from(&[
            ("TWELVE_LABS_API_KEY", "key"),
            ("TWELVE_LABS_INDEX_ID", "idx"),
            ("POLL_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TWELVE_LABS_API_KEY", "key"),
            ("TWELVE_LABS_INDEX_ID", "idx"),
            ("REDIS_URL", "redis://cache/"),
            ("POLL_MAX_ATTEMPTS", "10"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache/"));
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.port, "8080");
    }
}
