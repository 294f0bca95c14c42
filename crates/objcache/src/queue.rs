// crates/objcache/src/queue.rs
// ============================================================================
// Module: Refresh Task Queue
// Description: Bounded FIFO of pending refresh tasks with deduplication.
// Purpose: Coalesce repeated refresh requests for the same scope.
// Dependencies: objcache-core
// ============================================================================

//! ## Overview
//! The queue is a plain FIFO guarded by the engine's queue lock. A push is
//! dropped when an equivalent task (same kind, same scope at that kind's
//! granularity) is already waiting, and new work is refused once the bound
//! is reached. A refused task is not lost for good: the next cache miss or
//! explicit refresh asks for it again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use objcache_core::RefreshTask;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of offering a task to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The task was appended.
    Queued,
    /// An equivalent task was already pending.
    Coalesced,
    /// The queue is full.
    Rejected,
}

/// Bounded, deduplicating FIFO of refresh tasks.
///
/// # Invariants
/// - No two pending tasks are equivalent.
/// - [`TaskQueue::push`] never grows the queue past `capacity()`; only
///   follow-ups of a running refresh may.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    /// Pending tasks, oldest first.
    tasks: VecDeque<RefreshTask>,
    /// Maximum number of pending tasks.
    capacity: usize,
}

impl TaskQueue {
    /// Creates an empty queue holding at most `capacity` tasks.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::new(),
            capacity,
        }
    }

    /// Offers a task, coalescing it with an equivalent pending task.
    pub fn push(&mut self, task: RefreshTask) -> EnqueueOutcome {
        if self.tasks.iter().any(|pending| pending.is_equivalent(&task)) {
            return EnqueueOutcome::Coalesced;
        }
        if self.tasks.len() >= self.capacity {
            return EnqueueOutcome::Rejected;
        }
        self.tasks.push_back(task);
        EnqueueOutcome::Queued
    }

    /// Offers a task emitted by a running refresh. Coalesces like
    /// [`TaskQueue::push`] but is never rejected: the emitting refresh has
    /// already marked its scope fetched, so nothing would queue it again.
    pub fn push_follow_up(&mut self, task: RefreshTask) -> EnqueueOutcome {
        if self.tasks.iter().any(|pending| pending.is_equivalent(&task)) {
            return EnqueueOutcome::Coalesced;
        }
        self.tasks.push_back(task);
        EnqueueOutcome::Queued
    }

    /// Removes and returns the oldest pending task.
    pub fn pop(&mut self) -> Option<RefreshTask> {
        self.tasks.pop_front()
    }

    /// Drops every pending task and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.tasks.len();
        self.tasks.clear();
        dropped
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the configured bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a copy of the pending tasks in execution order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RefreshTask> {
        self.tasks.iter().cloned().collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
