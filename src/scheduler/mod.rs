//! Deferred execution
//!
//! A single-threaded "run this once, right after I return" primitive. Each
//! [`IdleHandle`] holds at most one pending task; scheduling again replaces
//! the pending one. The core drains pending tasks after every externally
//! sourced event, so a task always runs before the next device event.
//!
//! Tasks run in the order their scheduling became final. A task scheduled
//! while a turn is running lands in the next turn.

pub mod timer;

use log::trace;
use std::collections::HashMap;

use crate::types::{IdAllocator, IdleHandle, PluginId};

pub use timer::Timers;

#[derive(Debug)]
struct Slot<T> {
    owner: PluginId,
    pending: Option<(u64, T)>,
}

/// Idle-call scheduler generic over the task object it carries
#[derive(Debug)]
pub struct Scheduler<T> {
    ids: IdAllocator,
    seq: u64,
    slots: HashMap<IdleHandle, Slot<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new(),
            seq: 0,
            slots: HashMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle owned by `owner`
    pub fn create_handle(&mut self, owner: PluginId) -> IdleHandle {
        let handle = IdleHandle(self.ids.next());
        self.slots.insert(
            handle,
            Slot {
                owner,
                pending: None,
            },
        );
        handle
    }

    /// Schedule `task` on `handle`, replacing whatever was pending there.
    /// Returns false for an unknown or destroyed handle.
    pub fn run_once(&mut self, handle: IdleHandle, task: T) -> bool {
        let Some(slot) = self.slots.get_mut(&handle) else {
            return false;
        };

        self.seq += 1;
        if slot.pending.replace((self.seq, task)).is_some() {
            trace!("{} re-armed, previous task dropped", handle);
        }
        true
    }

    /// Cancel the pending task, if any. Returns whether one was pending.
    pub fn cancel(&mut self, handle: IdleHandle) -> bool {
        self.slots
            .get_mut(&handle)
            .and_then(|slot| slot.pending.take())
            .is_some()
    }

    /// Destroy a handle, silently dropping its pending task
    pub fn destroy_handle(&mut self, handle: IdleHandle) -> bool {
        self.slots.remove(&handle).is_some()
    }

    /// Destroy every handle owned by `owner`
    pub fn destroy_owner(&mut self, owner: PluginId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.owner != owner);
        before - self.slots.len()
    }

    pub fn is_pending(&self, handle: IdleHandle) -> bool {
        self.slots
            .get(&handle)
            .is_some_and(|slot| slot.pending.is_some())
    }

    pub fn has_pending(&self) -> bool {
        self.slots.values().any(|slot| slot.pending.is_some())
    }

    pub fn handle_count(&self, owner: PluginId) -> usize {
        self.slots.values().filter(|slot| slot.owner == owner).count()
    }

    /// Marker separating this turn's tasks from ones scheduled during it
    pub fn turn_marker(&self) -> u64 {
        self.seq
    }

    /// Take the oldest task whose scheduling became final at or before
    /// `marker`
    pub fn pop_before(&mut self, marker: u64) -> Option<(IdleHandle, PluginId, T)> {
        let (&handle, _) = self
            .slots
            .iter()
            .filter_map(|(handle, slot)| slot.pending.as_ref().map(|(seq, _)| (handle, *seq)))
            .filter(|(_, seq)| *seq <= marker)
            .min_by_key(|(_, seq)| *seq)?;

        let slot = self.slots.get_mut(&handle)?;
        let (_, task) = slot.pending.take()?;
        Some((handle, slot.owner, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: PluginId = PluginId(1);

    fn drain(scheduler: &mut Scheduler<&'static str>) -> Vec<&'static str> {
        let marker = scheduler.turn_marker();
        let mut ran = Vec::new();
        while let Some((_, _, task)) = scheduler.pop_before(marker) {
            ran.push(task);
        }
        ran
    }

    #[test]
    fn test_rescheduling_replaces_pending_task() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.create_handle(OWNER);

        scheduler.run_once(handle, "a");
        scheduler.run_once(handle, "b");

        assert_eq!(drain(&mut scheduler), vec!["b"]);
        assert!(drain(&mut scheduler).is_empty());
    }

    #[test]
    fn test_destroyed_handle_never_runs() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.create_handle(OWNER);
        scheduler.run_once(handle, "a");

        assert!(scheduler.destroy_handle(handle));
        assert!(drain(&mut scheduler).is_empty());
        assert!(!scheduler.run_once(handle, "b"));
    }

    #[test]
    fn test_tasks_run_in_finalization_order() {
        let mut scheduler = Scheduler::new();
        let first = scheduler.create_handle(OWNER);
        let second = scheduler.create_handle(OWNER);

        scheduler.run_once(first, "first");
        scheduler.run_once(second, "second");
        // Re-arming moves the handle to the back
        scheduler.run_once(first, "first again");

        assert_eq!(drain(&mut scheduler), vec!["second", "first again"]);
    }

    #[test]
    fn test_task_scheduled_during_turn_waits_for_next_turn() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.create_handle(OWNER);
        scheduler.run_once(handle, "a");

        let marker = scheduler.turn_marker();
        let (h, _, task) = scheduler.pop_before(marker).unwrap();
        assert_eq!(task, "a");
        scheduler.run_once(h, "again");

        assert!(scheduler.pop_before(marker).is_none());
        assert!(scheduler.is_pending(handle));
        assert_eq!(drain(&mut scheduler), vec!["again"]);
    }

    #[test]
    fn test_cancel_reports_pending_state() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.create_handle(OWNER);

        assert!(!scheduler.cancel(handle));
        scheduler.run_once(handle, "a");
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_destroy_owner_drops_all_handles() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        scheduler.create_handle(OWNER);
        scheduler.create_handle(OWNER);
        scheduler.create_handle(PluginId(2));

        assert_eq!(scheduler.destroy_owner(OWNER), 2);
        assert_eq!(scheduler.handle_count(OWNER), 0);
        assert_eq!(scheduler.handle_count(PluginId(2)), 1);
    }
}
