//! FIFO queue of suspended `get()` calls

use crate::errors::ClosedError;
use crate::membership::ResourceId;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// What a queued caller is woken up with
#[derive(Debug)]
pub(crate) enum Grant<R> {
    /// A released resource, already checked out to the waiter
    Resource(ResourceId, R),
    /// Capacity freed up; the waiter owns this reservation and must create
    Slot(ResourceId),
}

pub(crate) type Delivery<R> = Result<Grant<R>, ClosedError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterId(u64);

#[derive(Debug)]
struct Waiter<R> {
    id: WaiterId,
    tx: oneshot::Sender<Delivery<R>>,
}

#[derive(Debug)]
pub(crate) struct WaiterQueue<R> {
    waiters: VecDeque<Waiter<R>>,
    next_id: u64,
}

impl<R> WaiterQueue<R> {
    pub fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Queue a new waiter at the tail
    pub fn enqueue(&mut self) -> (WaiterId, oneshot::Receiver<Delivery<R>>) {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(Waiter { id, tx });
        (id, rx)
    }

    /// Withdraw a waiter that gave up. Unknown ids are ignored.
    pub fn cancel(&mut self, id: WaiterId) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Hand `grant` to the oldest live waiter.
    ///
    /// Waiters whose receiving side is gone are discarded on the way. If no
    /// live waiter is left the grant is returned.
    pub fn offer(&mut self, grant: Grant<R>) -> Result<(), Grant<R>> {
        let mut grant = grant;
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(Ok(grant)) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    tracing::trace!("discarding abandoned waiter");
                    grant = match returned {
                        Ok(grant) => grant,
                        Err(_) => unreachable!("only grants are offered"),
                    };
                }
            }
        }
        Err(grant)
    }

    /// Reject every queued waiter with `error`
    pub fn reject_all(&mut self, error: &ClosedError) -> usize {
        let count = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.tx.send(Err(error.clone()));
        }
        count
    }
}
