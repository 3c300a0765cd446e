use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Dispatcher tuning knobs. Keys are camelCase when deserialized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub backoff_factor: f64,
    pub backoff_cap_ms: u64,
    pub handler_timeout_ms: u64,
    pub partition_queue_capacity: usize,
    /// Let a terminal `Failed` outcome advance the commit cursor.
    pub commit_past_failures: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 100,
            backoff_factor: 2.0,
            backoff_cap_ms: 10_000,
            handler_timeout_ms: 30_000,
            partition_queue_capacity: 64,
            commit_past_failures: false,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: "backoffFactor",
                reason: format!("must be a finite number >= 1.0, got {}", self.backoff_factor),
            });
        }
        if self.handler_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "handlerTimeoutMs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.backoff_cap_ms < self.base_backoff_ms {
            return Err(ConfigError::Invalid {
                key: "backoffCapMs",
                reason: format!(
                    "{} is below baseBackoffMs {}",
                    self.backoff_cap_ms, self.base_backoff_ms
                ),
            });
        }
        if self.partition_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "partitionQueueCapacity",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.handler_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let json = r#"{ "maxRetries": 5, "baseBackoffMs": 50, "commitPastFailures": true }"#;
        let config: DispatchConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_backoff(), Duration::from_millis(50));
        assert!(config.commit_past_failures);
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.backoff_cap_ms, 10_000);
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let config = DispatchConfig {
            backoff_factor: 0.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backoffFactor"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = DispatchConfig {
            handler_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_cap_below_base() {
        let config = DispatchConfig {
            base_backoff_ms: 500,
            backoff_cap_ms: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backoffCapMs"));
    }
}
