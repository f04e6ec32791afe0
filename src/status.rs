//! Point-in-time view of a pool

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of the pool's counters
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use esox_resourcepool::{ManageResource, PoolConfiguration, ResourcePool};
/// # struct Numbers;
/// # #[async_trait]
/// # impl ManageResource for Numbers {
/// #     type Resource = u32;
/// #     type Error = ();
/// #     async fn create(&self) -> Result<u32, ()> { Ok(1) }
/// #     fn dispose(&self, _: u32) {}
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let pool = ResourcePool::new(Numbers, PoolConfiguration::default()).unwrap();
/// let status = pool.status();
/// assert_eq!(status.total, 0);
/// assert_eq!(status.max_count, 3);
/// assert!(!status.closed);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStatus {
    /// Every resource the pool owns, including ones still being created
    pub total: usize,

    /// Resources waiting on the idle list
    pub idle: usize,

    /// Resources checked out to callers
    pub busy: usize,

    /// Reservations whose resource is still being created
    pub creating: usize,

    /// Callers queued for a resource
    pub waiting: usize,

    /// Configured capacity
    pub max_count: usize,

    /// Whether the pool has been closed
    pub closed: bool,
}

impl PoolStatus {
    /// Fraction of capacity in use (creating or checked out), 0.0 to 1.0
    pub fn utilization(&self) -> f64 {
        if self.max_count > 0 {
            (self.busy + self.creating) as f64 / self.max_count as f64
        } else {
            0.0
        }
    }

    /// Whether a `get()` issued now would have to queue
    pub fn is_saturated(&self) -> bool {
        self.idle == 0 && self.total >= self.max_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(busy: usize, idle: usize) -> PoolStatus {
        PoolStatus {
            total: busy + idle,
            idle,
            busy,
            creating: 0,
            waiting: 0,
            max_count: 4,
            closed: false,
        }
    }

    #[test]
    fn test_utilization() {
        assert_eq!(status(0, 0).utilization(), 0.0);
        assert_eq!(status(2, 1).utilization(), 0.5);
        assert_eq!(status(4, 0).utilization(), 1.0);
    }

    #[test]
    fn test_saturation() {
        assert!(!status(3, 0).is_saturated());
        assert!(!status(3, 1).is_saturated());
        assert!(status(4, 0).is_saturated());
    }
}
