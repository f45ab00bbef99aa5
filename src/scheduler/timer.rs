//! Plugin timers on the core's logical clock
//!
//! Timers behave like event-loop timer sources: created disarmed, armed with
//! a relative delay, disarmed again when they fire. A periodic timer is a
//! timer its owner re-arms from inside its own callback.

use std::collections::HashMap;

use crate::types::{IdAllocator, PluginId, TimerId};

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    owner: PluginId,
    deadline: Option<(u64, u64)>,
}

/// Timer registry; time is in milliseconds
#[derive(Debug, Default)]
pub struct Timers {
    ids: IdAllocator,
    seq: u64,
    now: u64,
    slots: HashMap<TimerId, TimerSlot>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Move the clock forward. Time never runs backwards.
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    pub fn add(&mut self, owner: PluginId) -> TimerId {
        let id = TimerId(self.ids.next());
        self.slots.insert(
            id,
            TimerSlot {
                owner,
                deadline: None,
            },
        );
        id
    }

    /// (Re)arm `id` to fire `delay_ms` from now
    pub fn arm(&mut self, id: TimerId, delay_ms: u64) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        self.seq += 1;
        slot.deadline = Some((self.now + delay_ms, self.seq));
        true
    }

    pub fn disarm(&mut self, id: TimerId) -> bool {
        self.slots
            .get_mut(&id)
            .and_then(|slot| slot.deadline.take())
            .is_some()
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub fn remove_owner(&mut self, owner: PluginId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.owner != owner);
        before - self.slots.len()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|slot| slot.deadline.is_some())
    }

    pub fn exists(&self, id: TimerId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn owner_count(&self, owner: PluginId) -> usize {
        self.slots.values().filter(|slot| slot.owner == owner).count()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.slots
            .values()
            .filter_map(|slot| slot.deadline.map(|(at, _)| at))
            .min()
    }

    /// Fire the earliest timer due at or before `until`: the clock moves to
    /// its deadline and the timer is disarmed.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerId, PluginId)> {
        let (id, at) = self
            .slots
            .iter()
            .filter_map(|(id, slot)| slot.deadline.map(|deadline| (*id, deadline)))
            .filter(|(_, (at, _))| *at <= until)
            .min_by_key(|(_, deadline)| *deadline)
            .map(|(id, (at, _))| (id, at))?;

        let slot = self.slots.get_mut(&id)?;
        slot.deadline = None;
        let owner = slot.owner;
        self.set_now(at);
        Some((id, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: PluginId = PluginId(1);

    #[test]
    fn test_timer_fires_once_at_deadline() {
        let mut timers = Timers::new();
        let id = timers.add(OWNER);
        assert!(timers.arm(id, 200));

        assert_eq!(timers.pop_due(199), None);
        assert_eq!(timers.pop_due(1000), Some((id, OWNER)));
        assert_eq!(timers.now(), 200);
        assert!(!timers.is_armed(id));
        assert_eq!(timers.pop_due(1000), None);
    }

    #[test]
    fn test_rearm_from_deadline_is_periodic() {
        let mut timers = Timers::new();
        let id = timers.add(OWNER);
        timers.arm(id, 200);

        let mut fired = Vec::new();
        while let Some((fired_id, _)) = timers.pop_due(1000) {
            fired.push(timers.now());
            timers.arm(fired_id, 250);
        }

        assert_eq!(fired, vec![200, 450, 700, 950]);
    }

    #[test]
    fn test_due_timers_fire_in_deadline_order() {
        let mut timers = Timers::new();
        let late = timers.add(OWNER);
        let early = timers.add(OWNER);
        timers.arm(late, 50);
        timers.arm(early, 10);

        assert_eq!(timers.next_deadline(), Some(10));
        assert_eq!(timers.pop_due(100).map(|(id, _)| id), Some(early));
        assert_eq!(timers.pop_due(100).map(|(id, _)| id), Some(late));
    }

    #[test]
    fn test_removed_timer_never_fires() {
        let mut timers = Timers::new();
        let id = timers.add(OWNER);
        timers.arm(id, 5);
        assert!(timers.remove(id));
        assert_eq!(timers.pop_due(100), None);
        assert!(!timers.arm(id, 5));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut timers = Timers::new();
        timers.set_now(100);
        timers.set_now(50);
        assert_eq!(timers.now(), 100);
    }
}
