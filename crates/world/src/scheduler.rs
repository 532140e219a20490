//! Deferred actions keyed on simulation time.

use spawnsync_core::{NetworkObjectId, SimTime};
use std::collections::BTreeMap;

/// Work the scheduler hands back when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Deactivate the object.
    Deactivate(NetworkObjectId),
}

/// Handle to a pending action; used to cancel it or read its end time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleHandle {
    id: u64,
    /// Time at which the action fires.
    pub end_time: SimTime,
}

#[derive(Debug, Clone)]
struct Pending {
    end_time: SimTime,
    action: ScheduledAction,
}

/// Single-threaded timer queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: BTreeMap<u64, Pending>,
}

impl Scheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `action` once `delay` seconds have passed after `now`.
    pub fn schedule(&mut self, now: SimTime, delay: f32, action: ScheduledAction) -> ScheduleHandle {
        let id = self.next_id;
        self.next_id += 1;
        let end_time = now.advance(delay);
        self.pending.insert(id, Pending { end_time, action });
        ScheduleHandle { id, end_time }
    }

    /// Cancel a pending action. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: ScheduleHandle) -> bool {
        self.pending.remove(&handle.id).is_some()
    }

    /// Whether `handle` is still waiting to fire.
    pub fn is_pending(&self, handle: ScheduleHandle) -> bool {
        self.pending.contains_key(&handle.id)
    }

    /// Remove and return every action due at `now`, earliest first.
    pub fn drain_due(&mut self, now: SimTime) -> Vec<ScheduledAction> {
        let mut due: Vec<(u64, Pending)> = Vec::new();
        self.pending.retain(|id, pending| {
            if pending.end_time.0 <= now.0 {
                due.push((*id, pending.clone()));
                false
            } else {
                true
            }
        });
        due.sort_by(|(a_id, a), (b_id, b)| a.end_time.0.total_cmp(&b.end_time.0).then(a_id.cmp(b_id)));
        due.into_iter().map(|(_, pending)| pending.action).collect()
    }

    /// Number of actions still waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_when_due_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(SimTime::ZERO, 2.0, ScheduledAction::Deactivate(NetworkObjectId(2)));
        scheduler.schedule(SimTime::ZERO, 1.0, ScheduledAction::Deactivate(NetworkObjectId(1)));

        assert!(scheduler.drain_due(SimTime(0.5)).is_empty());
        assert_eq!(
            scheduler.drain_due(SimTime(2.0)),
            vec![
                ScheduledAction::Deactivate(NetworkObjectId(1)),
                ScheduledAction::Deactivate(NetworkObjectId(2)),
            ]
        );
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn cancelled_actions_never_fire() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(SimTime(1.0), 1.0, ScheduledAction::Deactivate(NetworkObjectId(1)));
        assert_eq!(handle.end_time, SimTime(2.0));
        assert!(scheduler.is_pending(handle));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.drain_due(SimTime(10.0)).is_empty());
    }
}
