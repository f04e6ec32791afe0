//! Error types for the resource pool

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error every rejected acquisition receives once the pool is closed.
///
/// The reason is shared, so cloning is cheap and every waiter, in-flight
/// creation and later `get()` observes the same value.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ClosedError;
///
/// assert_eq!(ClosedError::default().to_string(), "pool is closed");
/// assert_eq!(ClosedError::new("shutting down").reason(), "shutting down");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ClosedError {
    reason: Arc<str>,
}

impl ClosedError {
    /// Create a closed error with a custom reason
    pub fn new(reason: impl Into<Arc<str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason the pool was closed
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for ClosedError {
    fn default() -> Self {
        Self::new("pool is closed")
    }
}

/// Errors returned when acquiring a resource
#[derive(Error, Debug, Clone)]
pub enum PoolError<E> {
    #[error(transparent)]
    Closed(#[from] ClosedError),

    #[error("Failed to create resource: {0}")]
    Create(E),

    #[error("Timed out after {0:?} waiting for a resource")]
    Timeout(Duration),
}

impl<E> PoolError<E> {
    /// Whether this error means the pool has been closed
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed(_))
    }
}

/// Invalid pool configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_count must be at least 1")]
    ZeroMaxCount,

    #[error("min_count ({min_count}) exceeds max_count ({max_count})")]
    MinExceedsMax { min_count: usize, max_count: usize },
}

pub type PoolResult<T, E> = Result<T, PoolError<E>>;
