//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{ClosedError, ConfigError, PoolError, PoolResult};
use crate::eviction::{self, IdleList, Sweep};
use crate::manager::ManageResource;
use crate::membership::{Membership, ResourceId, Status};
use crate::status::PoolStatus;
use crate::waiters::{Delivery, Grant, WaiterId, WaiterQueue};

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type Resource<M> = <M as ManageResource>::Resource;

/// How [`ResourcePool::close_with`] treats resources that are still checked out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseMode {
    /// Wait until every checked-out resource has come back
    #[default]
    Graceful,

    /// Drop checked-out resources from the pool right away
    Force,
}

/// A resource checked out of a pool; goes back to the pool when dropped
pub struct Pooled<M: ManageResource> {
    resource: Option<Resource<M>>,
    token: ResourceId,
    pool: Arc<PoolInner<M>>,
}

impl<M: ManageResource> Pooled<M> {
    fn new(resource: Resource<M>, token: ResourceId, pool: Arc<PoolInner<M>>) -> Self {
        Self {
            resource: Some(resource),
            token,
            pool,
        }
    }

    /// Token the pool tracks this resource under
    pub fn id(&self) -> ResourceId {
        self.token
    }

    /// Take the resource out of the pool without disposing it.
    ///
    /// Use this when the resource is known to be broken: the pool forgets it,
    /// frees its capacity and leaves the resource to the caller.
    pub fn detach(mut self) -> Resource<M> {
        let resource = self.resource.take().expect("resource already taken");
        self.pool.detach(self.token);
        resource
    }
}

impl<M: ManageResource> Deref for Pooled<M> {
    type Target = Resource<M>;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("resource already taken")
    }
}

impl<M: ManageResource> DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("resource already taken")
    }
}

impl<M: ManageResource> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(self.token, resource);
        }
    }
}

impl<M> fmt::Debug for Pooled<M>
where
    M: ManageResource,
    Resource<M>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("token", &self.token)
            .field("resource", &self.resource)
            .finish()
    }
}

struct PoolState<R> {
    members: Membership,
    idle: IdleList<R>,
    waiters: WaiterQueue<R>,
    closed: Option<ClosedError>,
    drained: Option<oneshot::Sender<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl<R> PoolState<R> {
    fn new() -> Self {
        Self {
            members: Membership::new(),
            idle: IdleList::new(),
            waiters: WaiterQueue::new(),
            closed: None,
            drained: None,
            sweeper: None,
        }
    }

    /// The graceful-close signal, once the last member has left a closed pool
    fn take_drained(&mut self) -> Option<oneshot::Sender<()>> {
        if self.closed.is_some() && self.members.is_empty() {
            self.drained.take()
        } else {
            None
        }
    }

    /// Forget `id` and pass the freed capacity on to the oldest waiter
    fn free_slot(&mut self, id: ResourceId) {
        self.members.remove(id);
        if self.closed.is_some() || self.waiters.is_empty() {
            return;
        }

        let slot = self.members.reserve();
        match self.waiters.offer(Grant::Slot(slot)) {
            Ok(()) => tracing::trace!(id = %slot, "handed freed capacity to waiter"),
            Err(_) => {
                self.members.remove(slot);
            }
        }
    }
}

/// Work to finish after the state lock is released: dispose first, then
/// signal a pending graceful close.
struct Settlement<R> {
    dispose: Vec<R>,
    drained: Option<oneshot::Sender<()>>,
}

impl<R> Settlement<R> {
    fn new() -> Self {
        Self {
            dispose: Vec::new(),
            drained: None,
        }
    }
}

enum Checkout<R> {
    Ready(ResourceId, R),
    Create(ResourceId),
    Wait(WaiterId, oneshot::Receiver<Delivery<R>>),
}

struct PoolInner<M: ManageResource> {
    manager: M,
    config: PoolConfiguration,
    state: Mutex<PoolState<Resource<M>>>,
}

impl<M: ManageResource> PoolInner<M> {
    fn settle(&self, settlement: Settlement<Resource<M>>) {
        for resource in settlement.dispose {
            self.manager.dispose(resource);
        }
        if let Some(drained) = settlement.drained {
            tracing::debug!("closed pool drained");
            let _ = drained.send(());
        }
    }

    fn closed_error(&self) -> Option<ClosedError> {
        self.state.lock().closed.clone()
    }

    fn checkout(&self) -> Result<Checkout<Resource<M>>, ClosedError> {
        let mut state = self.state.lock();
        if let Some(error) = &state.closed {
            return Err(error.clone());
        }

        if let Some(entry) = state.idle.pop_newest() {
            let uses = state.members.check_out(entry.id);
            tracing::trace!(id = %entry.id, ?uses, "reusing idle resource");
            return Ok(Checkout::Ready(entry.id, entry.resource));
        }

        if state.members.len() < self.config.max_count {
            let id = state.members.reserve();
            tracing::trace!(id = %id, "reserved capacity for a new resource");
            return Ok(Checkout::Create(id));
        }

        let (waiter, rx) = state.waiters.enqueue();
        tracing::trace!(waiting = state.waiters.len(), "pool exhausted, queueing caller");
        Ok(Checkout::Wait(waiter, rx))
    }

    fn finish_creation(
        &self,
        id: ResourceId,
        created: Result<Resource<M>, M::Error>,
    ) -> PoolResult<Resource<M>, M::Error> {
        let mut settlement = Settlement::new();
        let outcome = {
            let mut state = self.state.lock();
            match created {
                Ok(resource) => match state.closed.clone() {
                    Some(error) => {
                        tracing::debug!(
                            id = %id,
                            "pool closed during creation, disposing new resource"
                        );
                        state.members.remove(id);
                        settlement.dispose.push(resource);
                        settlement.drained = state.take_drained();
                        Err(PoolError::Closed(error))
                    }
                    None => {
                        state.members.created(id);
                        tracing::debug!(id = %id, total = state.members.len(), "created resource");
                        Ok(resource)
                    }
                },
                Err(error) => {
                    tracing::debug!(id = %id, "resource creation failed");
                    state.free_slot(id);
                    settlement.drained = state.take_drained();
                    Err(PoolError::Create(error))
                }
            }
        };
        self.settle(settlement);
        outcome
    }

    /// Give up a reservation without creating anything
    fn abandon_reservation(&self, id: ResourceId) {
        let mut settlement = Settlement::new();
        {
            let mut state = self.state.lock();
            state.free_slot(id);
            settlement.drained = state.take_drained();
        }
        self.settle(settlement);
    }

    fn release(self: &Arc<Self>, id: ResourceId, resource: Resource<M>) {
        let mut settlement = Settlement::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            match state.members.get(id).map(|m| m.use_total) {
                None => {
                    tracing::trace!(
                        id = %id,
                        "disposing resource dropped from the pool by a forced close"
                    );
                    settlement.dispose.push(resource);
                }
                Some(_) if state.closed.is_some() => {
                    state.members.remove(id);
                    settlement.dispose.push(resource);
                    settlement.drained = state.take_drained();
                }
                Some(uses) if self.config.is_exhausted(uses) => {
                    tracing::debug!(id = %id, uses, "usage limit reached, retiring resource");
                    state.free_slot(id);
                    settlement.dispose.push(resource);
                }
                Some(_) => match state.waiters.offer(Grant::Resource(id, resource)) {
                    Ok(()) => tracing::trace!(id = %id, "handed released resource to waiter"),
                    Err(Grant::Resource(_, resource)) => {
                        state.members.park(id);
                        state.idle.push(id, resource, Instant::now());
                        self.arm_sweeper(state);
                    }
                    Err(Grant::Slot(_)) => unreachable!("offered a resource, got a slot back"),
                },
            }
        }
        self.settle(settlement);
    }

    fn detach(&self, id: ResourceId) {
        let mut settlement = Settlement::new();
        {
            let mut state = self.state.lock();
            if state.members.get(id).is_none() {
                return;
            }
            tracing::debug!(id = %id, "detaching resource without disposal");
            state.free_slot(id);
            settlement.drained = state.take_drained();
        }
        self.settle(settlement);
    }

    /// A queued `get()` was dropped. Withdraw it, and route back anything that
    /// was handed to it before it noticed.
    fn abandon_wait(
        self: &Arc<Self>,
        waiter: WaiterId,
        rx: &mut oneshot::Receiver<Delivery<Resource<M>>>,
    ) {
        if self.state.lock().waiters.cancel(waiter) {
            tracing::trace!("withdrew cancelled waiter");
        }
        rx.close();
        match rx.try_recv() {
            Ok(Ok(Grant::Resource(id, resource))) => self.release(id, resource),
            Ok(Ok(Grant::Slot(id))) => self.abandon_reservation(id),
            _ => {}
        }
    }

    /// A waiter resumed holding a handed-over resource. Counts the checkout
    /// unless the pool closed in the meantime.
    fn claim(&self, id: ResourceId) -> Result<(), ClosedError> {
        let mut state = self.state.lock();
        if let Some(error) = &state.closed {
            return Err(error.clone());
        }
        let uses = state.members.record_use(id);
        tracing::trace!(id = %id, ?uses, "waiter took over released resource");
        Ok(())
    }

    fn arm_sweeper(self: &Arc<Self>, state: &mut PoolState<Resource<M>>) {
        let Some(period) = self.config.idle_timeout else {
            return;
        };
        if state.sweeper.is_none() {
            state.sweeper = eviction::spawn_sweeper(Arc::downgrade(self), period);
        }
    }

    fn close(&self, mode: CloseMode, error: ClosedError) -> Option<oneshot::Receiver<()>> {
        let mut settlement = Settlement::new();
        let drained = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed.is_some() {
                return None;
            }

            tracing::debug!(reason = %error, ?mode, "closing pool");
            state.closed = Some(error.clone());
            if let Some(sweeper) = state.sweeper.take() {
                sweeper.abort();
            }

            let rejected = state.waiters.reject_all(&error);
            if rejected > 0 {
                tracing::debug!(rejected, "rejected queued callers");
            }

            for entry in state.idle.drain() {
                state.members.remove(entry.id);
                settlement.dispose.push(entry.resource);
            }

            if mode == CloseMode::Force {
                let dropped = state.members.remove_busy();
                tracing::debug!(
                    dropped = dropped.len(),
                    "force close dropped checked-out resources"
                );
            }

            if mode == CloseMode::Graceful && !state.members.is_empty() {
                let (tx, rx) = oneshot::channel();
                state.drained = Some(tx);
                Some(rx)
            } else {
                None
            }
        };
        self.settle(settlement);
        drained
    }

    fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            total: state.members.len(),
            idle: state.idle.len(),
            busy: state.members.count(Status::Busy),
            creating: state.members.count(Status::Creating),
            waiting: state.waiters.len(),
            max_count: self.config.max_count,
            closed: state.closed.is_some(),
        }
    }
}

impl<M: ManageResource> Sweep for PoolInner<M> {
    fn sweep(&self) -> bool {
        let Some(timeout) = self.config.idle_timeout else {
            return false;
        };

        let (evicted, rearm) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed.is_some() {
                state.sweeper = None;
                return false;
            }

            let checked_out = state.members.len() - state.idle.len();
            let protected = self.config.min_count.saturating_sub(checked_out);
            let evicted = state.idle.evict_expired(Instant::now(), timeout, protected);
            for entry in &evicted {
                state.members.remove(entry.id);
            }

            let rearm = !state.idle.is_empty();
            if !rearm {
                state.sweeper = None;
            }
            (evicted, rearm)
        };

        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "evicted idle resources");
        }
        let mut settlement = Settlement::new();
        settlement.dispose = evicted.into_iter().map(|e| e.resource).collect();
        self.settle(settlement);
        rearm
    }
}

impl<M: ManageResource> Drop for PoolInner<M> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }
        let leftovers: Vec<_> = state.idle.drain().map(|e| e.resource).collect();
        for resource in leftovers {
            self.manager.dispose(resource);
        }
    }
}

/// Holds a capacity reservation while `create()` runs; gives it back if the
/// acquiring future is dropped midway.
struct Reservation<'a, M: ManageResource> {
    pool: &'a Arc<PoolInner<M>>,
    id: ResourceId,
    armed: bool,
}

impl<M: ManageResource> Reservation<'_, M> {
    fn complete(
        mut self,
        created: Result<Resource<M>, M::Error>,
    ) -> PoolResult<Resource<M>, M::Error> {
        self.armed = false;
        self.pool.finish_creation(self.id, created)
    }
}

impl<M: ManageResource> Drop for Reservation<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            tracing::trace!(id = %self.id, "acquisition dropped during creation");
            self.pool.abandon_reservation(self.id);
        }
    }
}

/// A queued `get()`; leaves the queue if dropped before being served
struct QueuedWaiter<'a, M: ManageResource> {
    pool: &'a Arc<PoolInner<M>>,
    id: WaiterId,
    rx: oneshot::Receiver<Delivery<Resource<M>>>,
    served: bool,
}

impl<M: ManageResource> QueuedWaiter<'_, M> {
    async fn wait(mut self) -> Result<Grant<Resource<M>>, ClosedError> {
        let delivery = (&mut self.rx).await;
        self.served = true;
        match delivery {
            Ok(delivery) => delivery,
            Err(_) => Err(self.pool.closed_error().unwrap_or_default()),
        }
    }
}

impl<M: ManageResource> Drop for QueuedWaiter<'_, M> {
    fn drop(&mut self) {
        if !self.served {
            self.pool.abandon_wait(self.id, &mut self.rx);
        }
    }
}

/// Bounded pool of resources produced by a [`ManageResource`] implementation.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_resourcepool::{ManageResource, PoolConfiguration, ResourcePool};
///
/// struct Buffers;
///
/// #[async_trait]
/// impl ManageResource for Buffers {
///     type Resource = Vec<u8>;
///     type Error = std::convert::Infallible;
///
///     async fn create(&self) -> Result<Vec<u8>, Self::Error> {
///         Ok(Vec::with_capacity(1024))
///     }
///
///     fn dispose(&self, _buffer: Vec<u8>) {}
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = ResourcePool::new(Buffers, PoolConfiguration::new().with_max_count(2)).unwrap();
/// {
///     let buffer = pool.get().await.unwrap();
///     assert_eq!(buffer.capacity(), 1024);
///     // Released when `buffer` goes out of scope
/// }
/// assert_eq!(pool.idle_count(), 1);
///
/// pool.close().await;
/// assert!(pool.get().await.unwrap_err().is_closed());
/// # }
/// ```
pub struct ResourcePool<M: ManageResource> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageResource> Clone for ResourcePool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ManageResource> fmt::Debug for ResourcePool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("status", &self.inner.status())
            .finish()
    }
}

impl<M: ManageResource> ResourcePool<M> {
    /// Create a pool that obtains resources from `manager`
    pub fn new(manager: M, config: PoolConfiguration) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                state: Mutex::new(PoolState::new()),
            }),
        })
    }

    /// Get a resource.
    ///
    /// Reuses the most recently released idle resource, creates a new one
    /// while under capacity, and otherwise queues until a resource is
    /// released. Queued callers are served in arrival order.
    pub async fn get(&self) -> PoolResult<Pooled<M>, M::Error> {
        match self.inner.checkout()? {
            Checkout::Ready(id, resource) => Ok(self.guard(id, resource)),
            Checkout::Create(id) => self.create(id).await,
            Checkout::Wait(waiter, rx) => {
                let queued = QueuedWaiter {
                    pool: &self.inner,
                    id: waiter,
                    rx,
                    served: false,
                };
                match queued.wait().await? {
                    Grant::Resource(id, resource) => match self.inner.claim(id) {
                        Ok(()) => Ok(self.guard(id, resource)),
                        Err(error) => {
                            self.inner.release(id, resource);
                            Err(error.into())
                        }
                    },
                    Grant::Slot(id) => match self.inner.closed_error() {
                        Some(error) => {
                            self.inner.abandon_reservation(id);
                            Err(error.into())
                        }
                        None => self.create(id).await,
                    },
                }
            }
        }
    }

    /// Get a resource, giving up after `timeout`
    pub async fn get_timeout(&self, timeout: Duration) -> PoolResult<Pooled<M>, M::Error> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
    }

    /// Return a resource to its pool. Same as dropping it.
    pub fn release(&self, resource: Pooled<M>) {
        drop(resource);
    }

    /// Remove a resource from its pool without disposing it, e.g. after the
    /// caller found the underlying connection broken.
    pub fn remove(&self, resource: Pooled<M>) -> Resource<M> {
        resource.detach()
    }

    /// Close the pool, waiting for checked-out resources to come back
    pub async fn close(&self) {
        self.close_with(CloseMode::Graceful, ClosedError::default()).await;
    }

    /// Close the pool without waiting for checked-out resources
    pub async fn force_close(&self) {
        self.close_with(CloseMode::Force, ClosedError::default()).await;
    }

    /// Close the pool, rejecting callers with `error`.
    ///
    /// Closing is permanent. Calling it again on a closed pool returns right
    /// away and changes nothing.
    pub async fn close_with(&self, mode: CloseMode, error: ClosedError) {
        if let Some(drained) = self.inner.close(mode, error) {
            let _ = drained.await;
        }
    }

    /// Every resource the pool owns, including ones still being created
    pub fn total_count(&self) -> usize {
        self.inner.state.lock().members.len()
    }

    /// Resources parked in the pool, ready for reuse
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Callers queued for a resource
    pub fn waiting_count(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed.is_some()
    }

    /// Snapshot of all counters taken under a single lock
    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    /// Configuration the pool was built with
    pub fn config(&self) -> &PoolConfiguration {
        &self.inner.config
    }

    /// Manager that creates and disposes the pool's resources
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    async fn create(&self, id: ResourceId) -> PoolResult<Pooled<M>, M::Error> {
        let reservation = Reservation {
            pool: &self.inner,
            id,
            armed: true,
        };
        let created = self.inner.manager.create().await;
        let resource = reservation.complete(created)?;
        Ok(self.guard(id, resource))
    }

    fn guard(&self, id: ResourceId, resource: Resource<M>) -> Pooled<M> {
        Pooled::new(resource, id, Arc::clone(&self.inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct Counter {
        created: Arc<AtomicUsize>,
        disposed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ManageResource for Counter {
        type Resource = usize;
        type Error = String;

        async fn create(&self) -> Result<usize, String> {
            Ok(self.created.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn dispose(&self, _resource: usize) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(config: PoolConfiguration) -> ResourcePool<Counter> {
        ResourcePool::new(Counter::default(), config).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PoolConfiguration::new().with_max_count(0);
        let result = ResourcePool::new(Counter::default(), config);
        assert_eq!(result.unwrap_err(), ConfigError::ZeroMaxCount);
    }

    #[tokio::test]
    async fn test_get_and_release() {
        let pool = pool(PoolConfiguration::default());

        {
            let resource = pool.get().await.unwrap();
            assert_eq!(*resource, 1);
            assert_eq!(pool.total_count(), 1);
            assert_eq!(pool.idle_count(), 0);
        }

        assert_eq!(pool.total_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_reuse_prefers_most_recently_released() {
        let pool = pool(PoolConfiguration::default());
        let first = pool.get().await.unwrap();
        let second = pool.get().await.unwrap();
        pool.release(first);
        pool.release(second);

        let reused = pool.get().await.unwrap();
        assert_eq!(*reused, 2);
        assert_eq!(pool.manager().created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let pool = pool(PoolConfiguration::new().with_max_count(2));
        let held = pool.get().await.unwrap();
        drop(pool.get().await.unwrap());

        let status = pool.status();
        assert_eq!(status.total, 2);
        assert_eq!(status.busy, 1);
        assert_eq!(status.idle, 1);
        assert_eq!(status.creating, 0);
        assert_eq!(status.waiting, 0);
        assert!(!status.closed);
        drop(held);
    }

    #[tokio::test]
    async fn test_detach_skips_disposal() {
        let pool = pool(PoolConfiguration::default());
        let resource = pool.get().await.unwrap();

        let raw = pool.remove(resource);
        assert_eq!(raw, 1);
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.manager().disposed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_disposes_idle() {
        let counter = Counter::default();
        let pool = ResourcePool::new(counter.clone(), PoolConfiguration::default()).unwrap();
        let held = pool.get().await.unwrap();
        drop(pool.get().await.unwrap());
        let clone = pool.clone();

        drop(pool);
        assert_eq!(counter.disposed.load(Ordering::SeqCst), 0);
        drop(clone);
        assert_eq!(
            counter.disposed.load(Ordering::SeqCst),
            0,
            "the held guard keeps the pool alive"
        );

        drop(held);
        assert_eq!(counter.disposed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let pool = pool(PoolConfiguration::default());
        drop(pool.get().await.unwrap());

        pool.close().await;
        pool.close().await;
        pool.force_close().await;

        assert!(pool.is_closed());
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.manager().disposed.load(Ordering::SeqCst), 1);
    }
}
