//! Executor settings

use std::time::Duration;

/// Namespace output properties are published under unless configured otherwise
pub const DEFAULT_NAMESPACE: &str = "aws.cloudformation";

/// Capabilities acknowledged on every change set
pub const DEFAULT_CAPABILITIES: [&str; 3] = [
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// Stack executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Delay between two status polls
    pub poll_interval: Duration,

    /// Upper bound for one stack deployment; `None` waits forever
    pub timeout: Option<Duration>,

    /// Prefix of generated change set names
    pub change_set_prefix: String,

    pub capabilities: Vec<String>,

    /// Backoff for throttled API calls
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: Some(Duration::from_secs(60 * 60)),
            change_set_prefix: "stackflow".to_string(),
            capabilities: DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for control plane calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    ///
    /// A delay that cannot be represented (overflow, negative or NaN factor)
    /// falls back to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            backoff_multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(10000)); // capped at max
    }

    #[test]
    fn test_unrepresentable_delay_is_capped() {
        let huge = RetryConfig {
            backoff_multiplier: 1e7,
            ..RetryConfig::default()
        };
        assert_eq!(huge.delay_for_attempt(3), huge.max_delay);
        assert_eq!(huge.delay_for_attempt(u32::MAX), huge.max_delay);

        let negative = RetryConfig {
            backoff_multiplier: -2.0,
            ..RetryConfig::default()
        };
        assert_eq!(negative.delay_for_attempt(1), negative.max_delay);

        let nan = RetryConfig {
            backoff_multiplier: f64::NAN,
            ..RetryConfig::default()
        };
        assert_eq!(nan.delay_for_attempt(2), nan.max_delay);
    }

    #[test]
    fn test_default_capabilities() {
        let config = ExecutorConfig::default();
        assert_eq!(config.capabilities.len(), 3);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }
}
