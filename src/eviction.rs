//! Idle list and the idle-eviction sweep

use crate::membership::ResourceId;
use std::collections::VecDeque;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A resource waiting for reuse
#[derive(Debug)]
pub(crate) struct IdleEntry<R> {
    pub id: ResourceId,
    pub resource: R,
    pub idle_since: Instant,
}

/// Idle resources ordered by the time they became idle, oldest first.
///
/// Reuse takes from the newest end so warm resources get picked up again,
/// eviction scans from the oldest end.
#[derive(Debug)]
pub(crate) struct IdleList<R> {
    entries: VecDeque<IdleEntry<R>>,
}

impl<R> IdleList<R> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, id: ResourceId, resource: R, now: Instant) {
        self.entries.push_back(IdleEntry {
            id,
            resource,
            idle_since: now,
        });
    }

    pub fn pop_newest(&mut self) -> Option<IdleEntry<R>> {
        self.entries.pop_back()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = IdleEntry<R>> + '_ {
        self.entries.drain(..)
    }

    /// Remove entries idle for longer than `timeout`, oldest first.
    ///
    /// The newest `protected` entries are never evicted. Scanning stops at the
    /// first entry that has not expired yet.
    pub fn evict_expired(
        &mut self,
        now: Instant,
        timeout: Duration,
        protected: usize,
    ) -> Vec<IdleEntry<R>> {
        let candidates = self.entries.len().saturating_sub(protected);
        let expired = self
            .entries
            .iter()
            .take(candidates)
            .take_while(|e| now.saturating_duration_since(e.idle_since) > timeout)
            .count();
        self.entries.drain(..expired).collect()
    }
}

/// Something the sweep timer can run against
pub(crate) trait Sweep: Send + Sync + 'static {
    /// Run one sweep. Returns whether the timer should fire again.
    fn sweep(&self) -> bool;
}

/// Start the eviction timer for `target`.
///
/// The task only holds a weak reference, so it winds down on its own once the
/// pool is gone. Returns `None` when called outside a tokio runtime.
pub(crate) fn spawn_sweeper<S: Sweep>(
    target: Weak<S>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        tracing::warn!("no tokio runtime available, idle eviction is not armed");
        return None;
    };

    Some(runtime.spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let Some(target) = target.upgrade() else {
                return;
            };
            if !target.sweep() {
                return;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::Membership;

    fn ids(count: usize) -> Vec<ResourceId> {
        let mut table = Membership::new();
        (0..count).map(|_| table.reserve()).collect()
    }

    #[test]
    fn test_reuse_is_lifo() {
        let ids = ids(3);
        let now = Instant::now();
        let mut list = IdleList::new();
        for (n, id) in ids.iter().enumerate() {
            list.push(*id, n, now);
        }

        assert_eq!(list.pop_newest().unwrap().resource, 2);
        assert_eq!(list.pop_newest().unwrap().resource, 1);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_evict_expired_stops_at_fresh_entry() {
        let ids = ids(3);
        let start = Instant::now();
        let mut list = IdleList::new();
        list.push(ids[0], "old", start);
        list.push(ids[1], "fresh", start + Duration::from_secs(8));
        list.push(ids[2], "old-but-behind", start);

        let now = start + Duration::from_secs(10);
        let evicted = list.evict_expired(now, Duration::from_secs(5), 0);
        let evicted: Vec<_> = evicted.into_iter().map(|e| e.resource).collect();
        assert_eq!(evicted, vec!["old"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_evict_expired_respects_protected_tail() {
        let ids = ids(3);
        let start = Instant::now();
        let mut list = IdleList::new();
        for (n, id) in ids.iter().enumerate() {
            list.push(*id, n, start);
        }

        let now = start + Duration::from_secs(60);
        let evicted = list.evict_expired(now, Duration::from_secs(1), 2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].resource, 0);
        assert_eq!(list.len(), 2);

        let evicted = list.evict_expired(now, Duration::from_secs(1), 5);
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_evict_requires_strictly_exceeding_timeout() {
        let ids = ids(1);
        let start = Instant::now();
        let mut list = IdleList::new();
        list.push(ids[0], (), start);

        let timeout = Duration::from_secs(5);
        assert!(list.evict_expired(start + timeout, timeout, 0).is_empty());

        let later = start + Duration::from_millis(5001);
        assert_eq!(list.evict_expired(later, timeout, 0).len(), 1);
    }
}
