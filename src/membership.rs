//! Membership table: every resource the pool owns, keyed by acquisition token

use std::collections::HashMap;
use std::fmt;

/// Token issued for every acquisition attempt before the resource exists.
///
/// The provisional reservation and the created resource live under the
/// same token, so capacity accounting covers resources still being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Creating,
    Busy,
    Idle,
}

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub status: Status,
    pub use_total: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Membership {
    members: HashMap<ResourceId, Member>,
    next_id: u64,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn count(&self, status: Status) -> usize {
        self.members.values().filter(|m| m.status == status).count()
    }

    /// Book capacity for a resource that is about to be created
    pub fn reserve(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.members.insert(
            id,
            Member {
                status: Status::Creating,
                use_total: 1,
            },
        );
        id
    }

    /// Creation finished; the resource is now checked out by its creator
    pub fn created(&mut self, id: ResourceId) -> bool {
        self.transition(id, Status::Creating, Status::Busy)
    }

    /// Hand out a resource again, counting the checkout
    pub fn check_out(&mut self, id: ResourceId) -> Option<usize> {
        self.members.get_mut(&id)?.status = Status::Busy;
        self.record_use(id)
    }

    /// Count a checkout of a resource that is already busy, e.g. one a
    /// waiter has just taken over from the previous holder
    pub fn record_use(&mut self, id: ResourceId) -> Option<usize> {
        let member = self.members.get_mut(&id)?;
        member.use_total += 1;
        Some(member.use_total)
    }

    pub fn park(&mut self, id: ResourceId) -> bool {
        self.transition(id, Status::Busy, Status::Idle)
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<Member> {
        self.members.remove(&id)
    }

    /// Drop every checked-out resource from accounting, returning their tokens.
    /// Reservations still being created are left alone.
    pub fn remove_busy(&mut self) -> Vec<ResourceId> {
        let busy: Vec<ResourceId> = self
            .members
            .iter()
            .filter(|(_, m)| m.status == Status::Busy)
            .map(|(id, _)| *id)
            .collect();
        for id in &busy {
            self.members.remove(id);
        }
        busy
    }

    fn transition(&mut self, id: ResourceId, from: Status, to: Status) -> bool {
        match self.members.get_mut(&id) {
            Some(member) if member.status == from => {
                member.status = to;
                true
            }
            _ => false,
        }
    }
}
