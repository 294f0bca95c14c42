// crates/objcache/src/scheduler.rs
// ============================================================================
// Module: Refresh Scheduler
// Description: Shared cache state, single background worker, and shutdown.
// Purpose: Drain refresh tasks on at most one worker thread at a time.
// Dependencies: objcache-core, objcache-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! [`CacheState`] is shared between the façade and the worker thread. Two
//! independent locks guard it: the store lock (every store read and write)
//! and the queue lock (pending tasks). When both are needed the store lock is
//! taken first; the queue lock is never held while waiting for the store.
//!
//! A capacity-one permit decides which caller may spawn the worker. The
//! worker drains the queue, releases the permit, then re-checks the queue
//! and re-acquires the permit if work arrived in between, so a task is never
//! left behind without a worker.
//!
//! Shutdown raises the flag while holding both locks, clears pending work and
//! the progress callback, and joins the worker. Fetches observe the flag
//! before every row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;

use objcache_core::ConnectionProvider;
use objcache_core::ProgressFeedback;
use objcache_core::RefreshTask;
use objcache_store_sqlite::SqliteCacheStore;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::fetchers::FetchError;
use crate::fetchers::fetch;
use crate::queue::EnqueueOutcome;
use crate::queue::TaskQueue;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// State shared by the façade and the refresh worker.
///
/// # Invariants
/// - At most one worker thread runs while `permit` is held.
/// - Once `shutdown` is set no task is queued and nothing is written.
pub(crate) struct CacheState {
    /// Store lock.
    store: Mutex<SqliteCacheStore>,
    /// Queue lock.
    queue: Mutex<TaskQueue>,
    /// Shutdown flag, raised under both locks.
    shutdown: AtomicBool,
    /// Worker permit; `true` while a worker owns it.
    permit: AtomicBool,
    /// Handle of the most recently spawned worker.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Progress callback, cleared on shutdown.
    feedback: Mutex<Option<ProgressFeedback>>,
    /// Source of live connections.
    provider: Arc<dyn ConnectionProvider>,
    /// Worker thread name.
    thread_name: String,
}

impl CacheState {
    /// Creates shared state around an open store.
    pub(crate) fn new(
        store: SqliteCacheStore,
        queue: TaskQueue,
        provider: Arc<dyn ConnectionProvider>,
        feedback: Option<ProgressFeedback>,
        thread_name: String,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            queue: Mutex::new(queue),
            shutdown: AtomicBool::new(false),
            permit: AtomicBool::new(false),
            worker: Mutex::new(None),
            feedback: Mutex::new(feedback),
            provider,
            thread_name,
        }
    }

    /// Locks the store.
    pub(crate) fn lock_store(&self) -> MutexGuard<'_, SqliteCacheStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the task queue.
    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, TaskQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true once shutdown has begun.
    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Returns true while a worker holds the permit.
    pub(crate) fn is_worker_active(&self) -> bool {
        self.permit.load(Ordering::Acquire)
    }

    /// Takes the worker permit if it is free.
    fn try_acquire_permit(&self) -> bool {
        self.permit.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Returns the worker permit.
    fn release_permit(&self) {
        self.permit.store(false, Ordering::Release);
    }

    /// Invokes the progress callback, if one is still installed.
    fn notify(&self, working: bool) {
        let callback = self.feedback.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(working);
        }
    }
}

// ============================================================================
// SECTION: Enqueue
// ============================================================================

/// Queues `task` unless an equivalent one is pending, then makes sure a
/// worker is running. No-op after shutdown.
pub(crate) fn add_pending_refresh(state: &Arc<CacheState>, task: RefreshTask) {
    let outcome = {
        let mut queue = state.lock_queue();
        if state.is_shut_down() {
            return;
        }
        log_enqueue(&task, queue.push(task.clone()), queue.capacity())
    };
    if outcome != EnqueueOutcome::Rejected {
        ensure_worker(state);
    }
}

/// Logs an enqueue outcome and passes it through.
fn log_enqueue(task: &RefreshTask, outcome: EnqueueOutcome, capacity: usize) -> EnqueueOutcome {
    match outcome {
        EnqueueOutcome::Queued => debug!(task = %task, "refresh task queued"),
        EnqueueOutcome::Coalesced => debug!(task = %task, "refresh task already pending"),
        EnqueueOutcome::Rejected => {
            warn!(task = %task, capacity, "refresh queue full; dropping task");
        }
    }
    outcome
}

/// Queues follow-up tasks from inside the worker; the running worker picks
/// them up, so no spawn is attempted. Follow-ups bypass the queue bound.
fn enqueue_follow_ups(state: &CacheState, follow_ups: Vec<RefreshTask>) {
    if follow_ups.is_empty() {
        return;
    }
    let mut queue = state.lock_queue();
    if state.is_shut_down() {
        return;
    }
    let capacity = queue.capacity();
    for task in follow_ups {
        let outcome = queue.push_follow_up(task.clone());
        log_enqueue(&task, outcome, capacity);
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Starts a worker unless one already holds the permit.
fn ensure_worker(state: &Arc<CacheState>) {
    if !state.try_acquire_permit() {
        return;
    }
    // The previous worker is joined under the handle lock so a concurrent
    // shutdown waits for it instead of finding no handle.
    let mut handle = state.worker.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(previous) = handle.take() {
        join_worker(previous);
    }
    if state.is_shut_down() {
        state.release_permit();
        return;
    }
    let worker_state = Arc::clone(state);
    let spawned = thread::Builder::new()
        .name(state.thread_name.clone())
        .spawn(move || run_worker(&worker_state));
    match spawned {
        Ok(join) => {
            *handle = Some(join);
            drop(handle);
            info!(thread = %state.thread_name, "refresh worker started");
        }
        Err(err) => {
            state.release_permit();
            error!(error = %err, "failed to spawn refresh worker");
        }
    }
}

/// Worker body: drain the queue, then hand back the permit.
fn run_worker(state: &CacheState) {
    if !state.is_shut_down() {
        state.notify(true);
    }
    loop {
        while let Some(task) = next_task(state) {
            run_task(state, &task);
        }
        state.release_permit();
        if state.is_shut_down() {
            debug!("refresh worker stopping for shutdown");
            return;
        }
        let pending = !state.lock_queue().is_empty();
        if !(pending && state.try_acquire_permit()) {
            break;
        }
        debug!("refresh worker resuming for late tasks");
    }
    info!("refresh worker drained queue");
    if !state.is_shut_down() {
        state.notify(false);
    }
}

/// Pops the next task unless shutdown has begun.
fn next_task(state: &CacheState) -> Option<RefreshTask> {
    if state.is_shut_down() {
        return None;
    }
    state.lock_queue().pop()
}

/// Runs one task; failures are logged and the worker moves on.
fn run_task(state: &CacheState, task: &RefreshTask) {
    debug!(task = %task, "running refresh task");
    let outcome = match fetch(task, state.provider.as_ref(), &state.shutdown) {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            debug!(task = %task, "refresh abandoned for shutdown");
            return;
        }
        Err(err) => {
            warn!(task = %task, error = %err, "refresh fetch failed");
            return;
        }
    };
    {
        let mut store = state.lock_store();
        if state.is_shut_down() {
            return;
        }
        if let Err(err) = outcome.payload.write(&mut store).map_err(FetchError::from) {
            error!(task = %task, error = %err, "refresh write failed; keeping cached names");
            return;
        }
    }
    enqueue_follow_ups(state, outcome.follow_ups);
}

/// Joins a finished worker handle; a handle owned by the calling thread is
/// detached instead.
fn join_worker(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!("refresh worker panicked");
    }
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

/// Stops background work and waits for the worker to exit. Idempotent.
pub(crate) fn shutdown(state: &CacheState) {
    {
        let _store = state.lock_store();
        let mut queue = state.lock_queue();
        if !state.shutdown.swap(true, Ordering::AcqRel) {
            let dropped = queue.clear();
            *state.feedback.lock().unwrap_or_else(PoisonError::into_inner) = None;
            info!(dropped, "autocompletion cache shutting down");
        }
    }
    let handle = state.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(handle) = handle {
        join_worker(handle);
        debug!("refresh worker joined");
    }
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Returns a copy of the pending tasks.
pub(crate) fn pending_tasks(state: &CacheState) -> Vec<RefreshTask> {
    state.lock_queue().snapshot()
}
