//! Cooperative recurring timers.
//!
//! Nothing here sleeps or spawns. The host loop calls
//! [`MusicEngine::poll`](crate::transport::MusicEngine::poll) with the current
//! instant and the engine drains whatever is due. A task that was starved for
//! several periods fires once and is rescheduled one interval from now; missed
//! periods are dropped rather than replayed in a burst.

use std::time::{Duration, Instant};

/// Shortest interval a task may have.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a registered task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Clone, Debug)]
struct Task {
    id: TaskId,
    interval: Duration,
    due: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct Timers {
    tasks: Vec<Task>,
    next: u64,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every `interval`, first at `now + interval`.
    pub fn every(&mut self, now: Instant, interval: Duration) -> TaskId {
        let interval = interval.max(MIN_INTERVAL);
        let id = TaskId(self.next);
        self.next += 1;
        self.tasks.push(Task { id, interval, due: now + interval });
        id
    }

    /// Returns whether the task was still registered.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest pending deadline, for hosts that sleep between polls.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.due).min()
    }

    /// Take the most overdue task due at `now` and reschedule it.
    ///
    /// Each task is returned at most once per `now`, so draining with
    /// `while let` always terminates.
    pub fn pop_due(&mut self, now: Instant) -> Option<TaskId> {
        let task = self.tasks.iter_mut().filter(|t| t.due <= now).min_by_key(|t| t.due)?;
        let mut due = task.due + task.interval;
        if due <= now {
            due = now + task.interval;
        }
        task.due = due;
        Some(task.id)
    }
}
