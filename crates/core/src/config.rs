use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Slice length used when nothing overrides it.
pub const DEFAULT_YIELD_INTERVAL_MS: u64 = 5;

/// Highest frame rate `force_frame_rate` accepts.
pub const DEFAULT_MAX_FRAME_RATE: u32 = 125;

// ── Scheduler ─────────────────────────────────────────────────

/// Scheduler configuration, parsed from JSON or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Length of one time slice in milliseconds. The work loop yields to the
    /// host once this much time has passed since the slice started.
    #[serde(default = "default_yield_interval")]
    pub yield_interval_ms: u64,
    /// Upper bound for `force_frame_rate`.
    #[serde(default = "default_max_frame_rate")]
    pub max_frame_rate: u32,
}

fn default_yield_interval() -> u64 { DEFAULT_YIELD_INTERVAL_MS }
fn default_max_frame_rate() -> u32 { DEFAULT_MAX_FRAME_RATE }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yield_interval_ms: default_yield_interval(),
            max_frame_rate: default_max_frame_rate(),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    ///
    /// Reads `COSLICE_YIELD_INTERVAL_MS` and `COSLICE_MAX_FRAME_RATE`; absent or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            yield_interval_ms: env_u64("COSLICE_YIELD_INTERVAL_MS", default_yield_interval()),
            max_frame_rate: env_u32("COSLICE_MAX_FRAME_RATE", default_max_frame_rate()),
        }
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.yield_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "yield_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_rate == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config loaded:");
        tracing::info!("  yield_interval: {}ms", self.yield_interval_ms);
        tracing::info!("  max_frame_rate: {}fps", self.max_frame_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.yield_interval_ms, 5);
        assert_eq!(config.max_frame_rate, 125);
        assert_eq!(config.yield_interval(), Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_missing_fields_use_defaults() {
        let config = SchedulerConfig::from_json(r#"{ "yield_interval_ms": 16 }"#).unwrap();
        assert_eq!(config.yield_interval_ms, 16);
        assert_eq!(config.max_frame_rate, DEFAULT_MAX_FRAME_RATE);
    }

    #[test]
    fn json_rejects_zero_interval() {
        let err = SchedulerConfig::from_json(r#"{ "yield_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn json_parse_error() {
        let err = SchedulerConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_env_reads_overrides_and_ignores_garbage() {
        std::env::set_var("COSLICE_YIELD_INTERVAL_MS", "12");
        std::env::set_var("COSLICE_MAX_FRAME_RATE", "not-a-number");
        let config = SchedulerConfig::from_env();
        std::env::remove_var("COSLICE_YIELD_INTERVAL_MS");
        std::env::remove_var("COSLICE_MAX_FRAME_RATE");

        assert_eq!(config.yield_interval_ms, 12);
        assert_eq!(config.max_frame_rate, DEFAULT_MAX_FRAME_RATE);
    }
}
