//! Deferred work for one room: a priority queue on the room's logical clock.
//!
//! Two kinds of entries live here. `after` transitions are installed when a
//! state is entered and carry the installing state's timer epoch — exiting
//! the state bumps the epoch, so stale entries are recognized and dropped
//! when they surface. `scheduleActions` batches carry their action list and
//! a snapshot of the event that scheduled them; they survive state changes
//! and die only with the room.
//!
//! The queue is passive: the owning room asks for [`next_deadline`] to arm
//! its sleep and calls [`pop_due`] when the clock reaches it. Entries fire
//! in non-decreasing fire-at order; ties break by insertion order.
//!
//! [`next_deadline`]: Scheduler::next_deadline
//! [`pop_due`]: Scheduler::pop_due

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde_json::Value as Json;

use crate::{ActionSpec, StateId};

/// One unit of deferred work.
#[derive(Debug, Clone)]
pub enum TimerTask {
    /// A state's `after` entry coming due.
    After {
        /// State that installed the timer.
        state: StateId,
        /// Timer epoch at install time; stale when the machine has since
        /// changed state.
        epoch: u64,
        /// Index into the state's `after` list.
        index: usize,
    },

    /// A `scheduleActions` batch coming due.
    Batch {
        actions: Vec<ActionSpec>,
        /// The event in scope when the batch was scheduled, used as the
        /// token-rendering view when it fires.
        event: Json,
    },
}

struct Entry {
    fire_at_ms: u64,
    seq: u64,
    task: TimerTask,
}

// Heap order is (fire_at_ms, seq) only; the task payload is opaque.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at_ms == other.fire_at_ms && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.fire_at_ms, self.seq).cmp(&(other.fire_at_ms, other.seq))
    }
}

/// Priority queue of deferred work, keyed by logical fire-at time.
#[derive(Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    seq: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a task to fire at `fire_at_ms` on the room's clock.
    pub fn schedule(&mut self, fire_at_ms: u64, task: TimerTask) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            fire_at_ms,
            seq,
            task,
        }));
    }

    /// The earliest fire-at time, if any work is pending.
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.fire_at_ms)
    }

    /// Pops the next task whose fire-at time is `<= now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerTask> {
        if self.next_deadline()? <= now_ms {
            self.heap.pop().map(|Reverse(e)| e.task)
        } else {
            None
        }
    }

    /// Drops all pending work. Called on room disposal.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
