//! Cooperative task scheduling.
//!
//! One logical thread runs due tasks to completion; nothing preempts
//! anything. Tasks are registered as shared `RefCell` handles so that other
//! components may hold the same task (to pause it, or feed it data) without
//! a locking primitive. Correctness relies on the execution model staying
//! single-threaded.

use core::cell::RefCell;

use heapless::Vec;
use thiserror_no_std::Error;

use crate::traits::TimeSource;

/// Maximum number of tasks one scheduler can hold.
pub const MAX_TASKS: usize = 8;

/// How a task wants to be scheduled next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    /// Run again `ms` after the current execution.
    After(u64),
    /// Run again `ms` after the previous due time. Keeps a periodic task
    /// drift-free regardless of how long its executions take.
    Increment(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("task capacity exceeded")]
    CapacityExceeded,
}

/// A cooperatively scheduled unit of work.
pub trait Task {
    /// Invoked when the task is due. Runs to completion and returns how to
    /// reschedule.
    fn execute(&mut self, now_ms: u64) -> Reschedule;

    /// Removes the task from the active schedule until [`Task::resume`].
    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn is_paused(&self) -> bool {
        false
    }
}

struct Slot<'a> {
    task: &'a RefCell<dyn Task + 'a>,
    next_due_ms: u64,
}

/// Runs registered tasks when due, in registration order.
pub struct TaskScheduler<'a, T: TimeSource> {
    time: T,
    slots: Vec<Slot<'a>, MAX_TASKS>,
}

impl<'a, T: TimeSource> TaskScheduler<'a, T> {
    pub fn new(time: T) -> Self {
        Self {
            time,
            slots: Vec::new(),
        }
    }

    /// Registers a task. It becomes due immediately.
    pub fn add_task(&mut self, task: &'a RefCell<dyn Task + 'a>) -> Result<(), SchedulerError> {
        let next_due_ms = self.time.now_ms();
        self.slots
            .push(Slot { task, next_due_ms })
            .map_err(|_| SchedulerError::CapacityExceeded)
    }

    /// Executes every due, unpaused task once.
    ///
    /// A paused task is kept due-now, so resuming it re-enters the schedule
    /// on the next pass. An [`Reschedule::Increment`] task that fell behind
    /// catches up one execution per pass.
    pub fn run_pending(&mut self) {
        for slot in self.slots.iter_mut() {
            let now_ms = self.time.now_ms();
            if slot.task.borrow().is_paused() {
                slot.next_due_ms = now_ms;
                continue;
            }
            if now_ms < slot.next_due_ms {
                continue;
            }
            let reschedule = slot.task.borrow_mut().execute(now_ms);
            slot.next_due_ms = match reschedule {
                Reschedule::After(ms) => now_ms + ms,
                Reschedule::Increment(ms) => slot.next_due_ms + ms,
            };
        }
    }
}
