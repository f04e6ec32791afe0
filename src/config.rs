//! Pool configuration options

use crate::errors::ConfigError;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_count(10)
///     .with_min_count(2)
///     .with_idle_timeout(Duration::from_secs(30))
///     .with_usage_limit(500);
///
/// assert_eq!(config.max_count, 10);
/// assert_eq!(config.usage_limit, Some(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Maximum number of live resources (creating, busy and idle together)
    pub max_count: usize,

    /// Number of resources the idle sweep keeps alive regardless of age
    pub min_count: usize,

    /// Idle resources older than this are evicted; `None` disables eviction
    pub idle_timeout: Option<Duration>,

    /// Resources are retired after this many checkouts; `None` means unlimited
    pub usage_limit: Option<usize>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_count: 3,
            min_count: 0,
            idle_timeout: None,
            usage_limit: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live resources
    pub fn with_max_count(mut self, count: usize) -> Self {
        self.max_count = count;
        self
    }

    /// Set the number of resources protected from idle eviction
    pub fn with_min_count(mut self, count: usize) -> Self {
        self.min_count = count;
        self
    }

    /// Set the idle timeout. A zero duration disables eviction.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Set the usage limit. Zero means unlimited.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// assert_eq!(PoolConfiguration::new().with_usage_limit(0).usage_limit, None);
    /// ```
    pub fn with_usage_limit(mut self, limit: usize) -> Self {
        self.usage_limit = (limit > 0).then_some(limit);
        self
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_count == 0 {
            return Err(ConfigError::ZeroMaxCount);
        }
        if self.min_count > self.max_count {
            return Err(ConfigError::MinExceedsMax {
                min_count: self.min_count,
                max_count: self.max_count,
            });
        }
        Ok(())
    }

    pub(crate) fn is_exhausted(&self, use_total: usize) -> bool {
        self.usage_limit.is_some_and(|limit| use_total >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_count, 3);
        assert_eq!(config.min_count, 0);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.usage_limit, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_idle_timeout_disables_eviction() {
        let config = PoolConfiguration::new().with_idle_timeout(Duration::ZERO);
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        assert_eq!(
            PoolConfiguration::new().with_max_count(0).validate(),
            Err(ConfigError::ZeroMaxCount)
        );
        assert_eq!(
            PoolConfiguration::new().with_max_count(2).with_min_count(3).validate(),
            Err(ConfigError::MinExceedsMax {
                min_count: 3,
                max_count: 2
            })
        );
    }

    #[test]
    fn test_usage_limit_exhaustion() {
        let config = PoolConfiguration::new().with_usage_limit(3);
        assert!(!config.is_exhausted(2));
        assert!(config.is_exhausted(3));
        assert!(!PoolConfiguration::new().is_exhausted(usize::MAX));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_fills_defaults() {
        let config: PoolConfiguration =
            serde_json::from_str(r#"{"max_count": 8, "usage_limit": 100}"#).unwrap();
        assert_eq!(config.max_count, 8);
        assert_eq!(config.usage_limit, Some(100));
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.min_count, 0);
    }
}
