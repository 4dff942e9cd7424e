//! # TaskScheduler: priority queue drained across frames and idle periods.
//!
//! ## Drain loop
//! ```text
//! schedule() ──► queue (priority desc, FIFO) ──► spawn drain loop (if not running)
//!
//! drain loop:
//!   ├─► host.idle() available AND registry.can_register(High)?
//!   │      yes ─► await idle deadline ─► run while time_remaining >= floor (≤ max_tasks_per_idle)
//!   │      no  ─► await next frame    ─► run ≤ tier.tasks_per_frame
//!   ├─► publish scheduler:processed { processed, remaining, tag: idle|frame }
//!   └─► queue empty? ─► stop, wake wait_idle()
//! ```
//!
//! ## Rules
//! - A task id maps to at most one live (pending or executing) task.
//! - The last 64 terminal states stay readable through
//!   `state_of` after the task leaves the queue.
//! - Cancelled and completed tasks never re-enter the queue.
//! - `cancel` only affects cancellable tasks that are still pending.
//! - Operation errors and panics mark the task `Failed`, call `on_error`, and
//!   go to the [`FailureBoundary`]; they never reach the caller of `schedule`.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;

use super::cache::SelectorCache;
use super::queue::{QueueKey, TaskQueue};
use super::task::{Task, TaskOptions, TaskState};
use crate::boundary::FailureBoundary;
use crate::config::Config;
use crate::error::{Failure, ScheduleError};
use crate::events::{Event, EventChannel, EventKind};
use crate::host::{Host, IdleDeadline, Surface};
use crate::policies::{PerformanceTier, Priority};
use crate::registry::ConcurrencyRegistry;

/// Counters reported by [`TaskScheduler::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks accepted by `schedule`.
    pub scheduled: u64,
    /// Tasks whose operation returned `Ok`.
    pub completed: u64,
    /// Tasks whose operation errored or panicked.
    pub failed: u64,
    /// Tasks removed by `cancel`.
    pub cancelled: u64,
    /// Tasks still queued.
    pub pending: usize,
}

/// Terminal states kept after their task leaves the index.
const OUTCOME_HISTORY: usize = 64;

struct Live {
    state: TaskState,
    key: QueueKey,
    cancellable: bool,
}

struct SchedState {
    queue: TaskQueue,
    index: HashMap<String, Live>,
    enabled: bool,
    tier: PerformanceTier,
    draining: bool,
    next_seq: u64,
    stats: SchedulerStats,
    outcomes: HashMap<String, TaskState>,
    outcome_order: VecDeque<String>,
}

impl SchedState {
    /// Drops `id` from the index and remembers how it ended.
    fn settle(&mut self, id: &str, state: TaskState) {
        self.index.remove(id);
        if self.outcomes.insert(id.to_string(), state).is_some() {
            self.outcome_order.retain(|k| k != id);
        }
        self.outcome_order.push_back(id.to_string());
        while self.outcome_order.len() > OUTCOME_HISTORY {
            if let Some(old) = self.outcome_order.pop_front() {
                self.outcomes.remove(&old);
            }
        }
    }
}

pub(super) struct Inner {
    state: Mutex<SchedState>,
    pub(super) host: Arc<dyn Host>,
    registry: ConcurrencyRegistry,
    boundary: Arc<FailureBoundary>,
    bus: EventChannel,
    pub(super) surface: Option<Arc<dyn Surface>>,
    pub(super) cache: Mutex<SelectorCache>,
    idle_floor: Duration,
    idle_cap: Option<usize>,
    settled: Notify,
}

/// Priority scheduler of deferred operations.
///
/// Cheap to clone: clones share the same queue.
#[derive(Clone)]
pub struct TaskScheduler {
    pub(super) inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("TaskScheduler")
            .field("enabled", &st.enabled)
            .field("tier", &st.tier)
            .field("pending", &st.queue.len())
            .finish()
    }
}

impl TaskScheduler {
    /// Creates a scheduler.
    ///
    /// `surface` backs the batch operations; without one they return
    /// [`ScheduleError::NoSurface`].
    pub fn new(
        host: Arc<dyn Host>,
        registry: ConcurrencyRegistry,
        boundary: Arc<FailureBoundary>,
        bus: EventChannel,
        surface: Option<Arc<dyn Surface>>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedState {
                    queue: TaskQueue::default(),
                    index: HashMap::new(),
                    enabled: true,
                    tier: config.tier,
                    draining: false,
                    next_seq: 0,
                    stats: SchedulerStats::default(),
                    outcomes: HashMap::new(),
                    outcome_order: VecDeque::new(),
                }),
                host,
                registry,
                boundary,
                bus,
                surface,
                cache: Mutex::new(SelectorCache::new(
                    config.selector_cache_capacity,
                    config.selector_cache_ttl,
                )),
                idle_floor: config.idle_slice_floor,
                idle_cap: config.idle_task_cap(),
                settled: Notify::new(),
            }),
        }
    }

    /// Enqueues `op` and starts draining.
    ///
    /// Returns the task id. Fails when the scheduler is disabled or the id
    /// is already used by a live task.
    pub fn schedule<F, E>(&self, op: F, opts: TaskOptions) -> Result<String, ScheduleError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<Failure>,
    {
        let priority = opts.priority;
        let (id, spawn) = {
            let mut st = self.inner.lock();
            if !st.enabled {
                return Err(ScheduleError::Disabled);
            }
            let seq = st.next_seq;
            let id = opts.id.unwrap_or_else(|| format!("task-{seq}"));
            if st.index.contains_key(&id) {
                return Err(ScheduleError::DuplicateId { id });
            }
            st.next_seq += 1;

            let key = st.queue.push(Task {
                id: id.clone(),
                op: Box::new(move || op().map_err(Into::into)),
                priority,
                seq,
                created_at: self.inner.host.now(),
                batch: opts.batch,
                on_complete: opts.on_complete,
                on_error: opts.on_error,
                context: opts.context,
            });
            st.index.insert(
                id.clone(),
                Live {
                    state: TaskState::Pending,
                    key,
                    cancellable: opts.cancellable,
                },
            );
            st.stats.scheduled += 1;
            let spawn = !st.draining;
            st.draining = true;
            (id, spawn)
        };

        tracing::trace!(task = %id, priority = priority.as_label(), "task scheduled");
        self.inner.bus.emit(
            Event::new(EventKind::TaskScheduled)
                .with_subject(id.as_str())
                .with_priority(priority),
        );
        if spawn {
            self.spawn_drain();
        }
        Ok(id)
    }

    /// [`schedule`](Self::schedule) with `Priority::High`.
    pub fn schedule_high<F, E>(&self, op: F, opts: TaskOptions) -> Result<String, ScheduleError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<Failure>,
    {
        self.schedule(op, opts.priority(Priority::High))
    }

    /// [`schedule`](Self::schedule) with `Priority::Low`.
    pub fn schedule_low<F, E>(&self, op: F, opts: TaskOptions) -> Result<String, ScheduleError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<Failure>,
    {
        self.schedule(op, opts.priority(Priority::Low))
    }

    fn spawn_drain(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain(Arc::clone(&self.inner)));
            }
            Err(_) => {
                tracing::warn!("no tokio runtime; tasks stay queued until flush()");
                self.inner.lock().draining = false;
            }
        }
    }

    /// Cancels a pending, cancellable task.
    ///
    /// Returns `false` for unknown, non-cancellable, executing or finished tasks.
    pub fn cancel(&self, id: &str) -> bool {
        {
            let mut st = self.inner.lock();
            let key = match st.index.get(id) {
                Some(live) if live.state == TaskState::Pending && live.cancellable => live.key,
                _ => return false,
            };
            st.queue.remove(&key);
            st.settle(id, TaskState::Cancelled);
            st.stats.cancelled += 1;
        }
        tracing::trace!(task = id, "task cancelled");
        self.inner
            .bus
            .emit(Event::new(EventKind::TaskCancelled).with_subject(id));
        true
    }

    /// Cancels every id in `ids`. Returns how many were cancelled.
    pub fn cancel_many<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter().filter(|id| self.cancel(id.as_ref())).count()
    }

    /// Enables or disables `schedule`. Already queued tasks still run.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
        tracing::debug!(enabled, "scheduler toggled");
    }

    /// True unless disabled with `set_enabled(false)`.
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Changes the tier, and with it the tasks-per-frame budget.
    pub fn set_tier(&self, tier: PerformanceTier) {
        self.inner.lock().tier = tier;
    }

    /// Current tier.
    pub fn tier(&self) -> PerformanceTier {
        self.inner.lock().tier
    }

    /// Lifecycle state of `id`.
    ///
    /// Live tasks report `Pending` or `Executing`; recently finished ones report
    /// their terminal state. `None` for unknown ids and for outcomes pushed
    /// out by the 64 most recent ones.
    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        let st = self.inner.lock();
        match st.index.get(id) {
            Some(live) => Some(live.state),
            None => st.outcomes.get(id).copied(),
        }
    }

    /// True if `id` is queued and not started.
    pub fn is_pending(&self, id: &str) -> bool {
        self.state_of(id) == Some(TaskState::Pending)
    }

    /// Number of queued tasks.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Counters since creation.
    pub fn stats(&self) -> SchedulerStats {
        let st = self.inner.lock();
        SchedulerStats {
            pending: st.queue.len(),
            ..st.stats
        }
    }

    /// Runs every queued task now, in queue order. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut n = 0;
        while self.inner.run_next() {
            n += 1;
        }
        if n > 0 {
            tracing::debug!(processed = n, "scheduler flushed");
        }
        self.inner.settled.notify_waiters();
        n
    }

    /// Resolves once the queue is empty and no drain loop is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let st = self.inner.lock();
                if st.queue.is_empty() && !st.draining {
                    return;
                }
            }
            notified.await;
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_idle(&self, deadline: IdleDeadline) -> usize {
        let mut n = 0;
        loop {
            if self.idle_cap.is_some_and(|cap| n >= cap) {
                break;
            }
            let left = deadline.time_remaining(self.host.now());
            if left < self.idle_floor && !deadline.did_timeout {
                break;
            }
            if !self.run_next() {
                break;
            }
            n += 1;
        }
        n
    }

    fn run_frame(&self) -> usize {
        let budget = self.lock().tier.profile().tasks_per_frame;
        let mut n = 0;
        while n < budget && self.run_next() {
            n += 1;
        }
        n
    }

    /// Pops and executes the head of the queue. `false` when empty.
    fn run_next(&self) -> bool {
        let task = {
            let mut st = self.lock();
            let Some(task) = st.queue.pop() else {
                return false;
            };
            if let Some(live) = st.index.get_mut(&task.id) {
                live.state = TaskState::Executing;
            }
            task
        };
        self.execute(task);
        true
    }

    fn execute(&self, task: Task) {
        let Task {
            id,
            op,
            priority,
            created_at,
            batch,
            on_complete,
            on_error,
            context,
            ..
        } = task;
        let waited = self.host.now().saturating_duration_since(created_at);
        tracing::trace!(task = %id, priority = priority.as_label(), batch, ?waited, "task executing");

        let result = match panic::catch_unwind(AssertUnwindSafe(op)) {
            Ok(r) => r,
            Err(payload) => Err(Failure::from_panic(payload)),
        };

        match result {
            Ok(()) => {
                self.finish(&id, TaskState::Completed, |s| s.completed += 1);
                if let Some(cb) = on_complete {
                    self.callback(&id, "on_complete", cb);
                }
                self.bus
                    .emit(Event::new(EventKind::TaskCompleted).with_subject(id.as_str()));
            }
            Err(failure) => {
                self.finish(&id, TaskState::Failed, |s| s.failed += 1);
                if let Some(cb) = on_error {
                    let f = failure.clone();
                    self.callback(&id, "on_error", move || cb(&f));
                }
                self.boundary
                    .handle(failure.clone(), context.with_meta("taskId", id.as_str()));
                self.bus.emit(
                    Event::new(EventKind::TaskFailed)
                        .with_subject(id.as_str())
                        .with_reason(failure.as_message()),
                );
            }
        }
    }

    fn finish(&self, id: &str, state: TaskState, count: impl FnOnce(&mut SchedulerStats)) {
        let mut st = self.lock();
        st.settle(id, state);
        count(&mut st.stats);
    }

    fn callback(&self, id: &str, which: &'static str, cb: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cb)) {
            let failure = Failure::from_panic(payload);
            tracing::error!(task = id, callback = which, error = %failure, "task callback panicked");
        }
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let idle = if inner.registry.can_register(Priority::High) {
            inner.host.idle()
        } else {
            None
        };
        let (path, processed) = match idle {
            Some(slot) => {
                let deadline = slot.await;
                ("idle", inner.run_idle(deadline))
            }
            None => {
                inner.host.next_frame().await;
                ("frame", inner.run_frame())
            }
        };

        let remaining = {
            let mut st = inner.lock();
            let remaining = st.queue.len();
            if remaining == 0 {
                st.draining = false;
            }
            remaining
        };
        inner.bus.emit(
            Event::new(EventKind::SchedulerProcessed)
                .with_counts(processed, remaining)
                .with_tag(path),
        );
        if remaining == 0 {
            inner.settled.notify_waiters();
            return;
        }
    }
}
