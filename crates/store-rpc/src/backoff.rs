//! Reconnection backoff for store streams.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum number of attempts (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_attempts: Some(5),
        }
    }
}

impl ReconnectConfig {
    /// Whether `attempts` failed attempts use up the budget
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.map(|max| attempts >= max).unwrap_or(false)
    }
}

/// Calculates the next reconnection delay using exponential backoff.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let delay_secs = config.initial_delay.as_secs_f64()
        * config.backoff_factor.powi(attempt.saturating_sub(1) as i32);

    Duration::from_secs_f64(delay_secs.min(config.max_delay.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(calculate_backoff(1, &config), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, &config), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, &config), Duration::from_millis(400));
        assert_eq!(calculate_backoff(10, &config), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_attempt_uses_initial_delay() {
        let config = ReconnectConfig::default();
        assert_eq!(calculate_backoff(0, &config), config.initial_delay);
    }

    #[test]
    fn test_exhausted() {
        let config = ReconnectConfig::default();
        assert!(!config.exhausted(4));
        assert!(config.exhausted(5));

        let unlimited = ReconnectConfig {
            max_attempts: None,
            ..ReconnectConfig::default()
        };
        assert!(!unlimited.exhausted(u32::MAX));
    }
}
