//! Registration store configuration.

use crate::retry::RetryPolicy;
use std::time::Duration;

/// Configuration for [`RegistrationStore`](crate::RegistrationStore) instances.
///
/// # Example
///
/// ```
/// use registration_runtime::{retry::RetryPolicy, StoreConfig};
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_number_retry(RetryPolicy::builder().max_retries(5).build())
///     .with_conflict_retry(RetryPolicy::none());
///
/// assert_eq!(config.number_retry.max_retries, 5);
/// assert_eq!(config.conflict_retry.max_retries, 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Regeneration policy when a registration number collides
    pub number_retry: RetryPolicy,
    /// Reload-and-reapply policy when an update hits a revision conflict
    pub conflict_retry: RetryPolicy,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(number_retry: RetryPolicy, conflict_retry: RetryPolicy) -> Self {
        Self {
            number_retry,
            conflict_retry,
        }
    }

    /// Set the registration-number retry policy
    #[must_use]
    pub fn with_number_retry(mut self, policy: RetryPolicy) -> Self {
        self.number_retry = policy;
        self
    }

    /// Set the revision-conflict retry policy
    #[must_use]
    pub fn with_conflict_retry(mut self, policy: RetryPolicy) -> Self {
        self.conflict_retry = policy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            number_retry: RetryPolicy::default(),
            conflict_retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(2))
                .max_delay(Duration::from_millis(50))
                .build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_retry_three_times() {
        let config = StoreConfig::default();
        assert_eq!(config.number_retry.max_retries, 3);
        assert_eq!(config.number_retry.initial_delay, Duration::from_millis(5));
        assert_eq!(config.conflict_retry.max_retries, 3);
    }
}
