use std::time::Duration;

use crate::config::DispatchConfig;

/// Exponential backoff schedule for handler retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: config.base_backoff(),
            factor: config.backoff_factor,
            cap: config.backoff_cap(),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the given retry, 1-based. `base * factor^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base.as_millis() as f64 * self.factor.powi(exponent);
        let capped = millis.min(self.cap.as_millis() as f64);

        if capped.is_finite() {
            Duration::from_millis(capped as u64)
        } else {
            self.cap
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            base: Duration::from_millis(100),
            factor: 2.0,
            cap: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_exponential_growth() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let p = policy();
        assert_eq!(p.backoff(4), Duration::from_millis(500));
        assert_eq!(p.backoff(60), Duration::from_millis(500));
    }

    #[test]
    fn test_max_attempts_includes_first_try() {
        assert_eq!(policy().max_attempts(), 5);
        let none = RetryPolicy {
            max_retries: 0,
            ..policy()
        };
        assert_eq!(none.max_attempts(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = DispatchConfig {
            max_retries: 7,
            base_backoff_ms: 10,
            backoff_factor: 3.0,
            backoff_cap_ms: 1_000,
            ..Default::default()
        };
        let p = RetryPolicy::from(&config);
        assert_eq!(p.max_retries, 7);
        assert_eq!(p.backoff(3), Duration::from_millis(90));
    }
}
