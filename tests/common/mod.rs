//! Shared test helpers: a connection manager that records what it did.

#![allow(dead_code)]

use async_trait::async_trait;
use esox_resourcepool::{ManageResource, PoolConfiguration, PoolStatus, ResourcePool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conn {
    pub id: usize,
}

/// Observes a [`TestManager`] after it has been moved into a pool
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    created: Arc<AtomicUsize>,
    disposed: Arc<Mutex<Vec<usize>>>,
}

impl Tracker {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> Vec<usize> {
        self.disposed.lock().clone()
    }
}

pub struct TestManager {
    tracker: Tracker,
    create_delay: Duration,
    failures: AtomicUsize,
    panic_on_dispose: AtomicBool,
}

impl TestManager {
    pub fn new() -> (Self, Tracker) {
        let tracker = Tracker::default();
        let manager = Self {
            tracker: tracker.clone(),
            create_delay: Duration::ZERO,
            failures: AtomicUsize::new(0),
            panic_on_dispose: AtomicBool::new(false),
        };
        (manager, tracker)
    }

    /// Every `create()` sleeps this long before finishing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// The next `count` calls to `create()` fail
    pub fn failing(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    /// The next call to `dispose()` records the resource, then panics
    pub fn panicking_dispose(self) -> Self {
        self.panic_on_dispose.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl ManageResource for TestManager {
    type Resource = Conn;
    type Error = String;

    async fn create(&self) -> Result<Conn, String> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("connection refused".to_string());
        }
        let id = self.tracker.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Conn { id })
    }

    fn dispose(&self, conn: Conn) {
        self.tracker.disposed.lock().push(conn.id);
        if self.panic_on_dispose.swap(false, Ordering::SeqCst) {
            panic!("failed to close connection {}", conn.id);
        }
    }
}

pub fn pool(config: PoolConfiguration) -> (ResourcePool<TestManager>, Tracker) {
    let (manager, tracker) = TestManager::new();
    (ResourcePool::new(manager, config).unwrap(), tracker)
}

pub fn pool_with(manager: TestManager, config: PoolConfiguration) -> ResourcePool<TestManager> {
    ResourcePool::new(manager, config).unwrap()
}

/// Let spawned tasks run until they block. With a paused clock this also
/// advances time by a millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Poll `future` exactly once on the current task.
///
/// Lets a test park a `get()` in the waiter queue and decide itself when, or
/// whether, that caller gets to resume.
pub async fn poll_once<F>(future: &mut F) -> Option<F::Output>
where
    F: Future + Unpin,
{
    tokio::select! {
        biased;
        output = future => Some(output),
        _ = std::future::ready(()) => None,
    }
}

pub fn assert_no_idle_while_waiting(status: &PoolStatus) {
    assert!(
        !(status.idle > 0 && status.waiting > 0),
        "idle resources and waiters coexist: {status:?}"
    );
    if status.waiting > 0 {
        assert_eq!(status.total, status.max_count, "waiters queued below capacity: {status:?}");
    }
}
