//! Timer: one background thread dispatching [`TimerTask`]s from a
//! deadline-ordered heap.
//!
//! Callers and the timer thread share the heap behind a single mutex and
//! a condition variable. Each task carries its own small mutex for its
//! state; when both are needed the heap lock is always taken first. No
//! lock is held while a task body runs, so bodies may schedule or cancel
//! other work on the same timer.
//!
//! Bodies run one at a time on the timer thread. A slow body delays
//! everything behind it; a fixed-rate task that falls behind catches up
//! with back-to-back runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, trace};
use parking_lot::{Condvar, Mutex};

use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::task_heap::TaskHeap;
use crate::timer_task::{Period, TaskState, TimerTask};

/// When a task should first run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Start {
    /// Relative to the moment the task is scheduled.
    After(Duration),
    /// An absolute point in time; past instants run as soon as possible.
    At(Instant),
}

impl Start {
    /// `None` when the deadline is not representable as an `Instant`.
    fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Start::After(delay) => now.checked_add(delay),
            Start::At(when) => Some(when),
        }
    }
}

impl From<Duration> for Start {
    fn from(delay: Duration) -> Self {
        Start::After(delay)
    }
}

impl From<Instant> for Start {
    fn from(when: Instant) -> Self {
        Start::At(when)
    }
}

struct Queue {
    heap: TaskHeap,
    /// No further dispatches; set by `cancel` or a panicking body.
    cancelled: bool,
    /// The owning `Timer` is gone; exit once the heap drains.
    finished: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// A scheduler with its own dispatch thread.
///
/// Prefer [`close`](Self::close) for shutdown: it cancels the timer and
/// waits for the thread to exit. Dropping a `Timer` without closing it
/// lets the thread finish every task already queued before exiting;
/// periodic tasks keep it alive until they are cancelled.
pub struct Timer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new() -> Result<Self> {
        Self::with_config(TimerConfig::default())
    }

    pub fn with_config(config: TimerConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                heap: TaskHeap::with_capacity(config.initial_heap_capacity),
                cancelled: false,
                finished: false,
            }),
            available: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let name = config.name;
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!("timer thread '{}' started", name);
                dispatch_loop(&worker);
                debug!("timer thread '{}' stopped", name);
            })
            .map_err(|e| Error::ThreadSpawn(e.to_string()))?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Run `task` once at `start`.
    pub fn schedule(&self, task: &TimerTask, start: impl Into<Start>) -> Result<()> {
        self.enqueue(task, start.into(), None)
    }

    /// Run `task` at `start`, then repeatedly `period` after each
    /// dispatch. Delays accumulate; long-run frequency drifts below
    /// `1 / period` but spacing between runs is preserved.
    pub fn schedule_with_fixed_delay(
        &self,
        task: &TimerTask,
        start: impl Into<Start>,
        period: Duration,
    ) -> Result<()> {
        check_period(period)?;
        self.enqueue(task, start.into(), Some(Period::FixedDelay(period)))
    }

    /// Run `task` at `start + n * period` for n = 0, 1, 2, ...; runs
    /// that fall behind are dispatched back to back to catch up.
    pub fn schedule_at_fixed_rate(
        &self,
        task: &TimerTask,
        start: impl Into<Start>,
        period: Duration,
    ) -> Result<()> {
        check_period(period)?;
        self.enqueue(task, start.into(), Some(Period::FixedRate(period)))
    }

    fn enqueue(&self, task: &TimerTask, start: Start, period: Option<Period>) -> Result<()> {
        let mut q = self.shared.queue.lock();
        if q.cancelled {
            return Err(Error::TimerCancelled);
        }
        let when = start
            .deadline(Instant::now())
            .ok_or_else(|| Error::illegal_argument("execution time overflows"))?;
        if let Some(p) = period {
            if when.checked_add(p.length()).is_none() {
                return Err(Error::illegal_argument("period overflows execution time"));
            }
        }
        {
            let mut s = task.lock_schedule();
            if s.state != TaskState::Virgin {
                return Err(Error::TaskAlreadyScheduled);
            }
            s.state = TaskState::Scheduled;
            s.period = period;
        }
        q.heap.push(when, task.clone());
        self.shared.available.notify_one();
        Ok(())
    }

    /// Stop dispatching. Queued tasks are discarded without changing
    /// their state; a body already running finishes. Idempotent.
    pub fn cancel(&self) {
        let mut q = self.shared.queue.lock();
        if !q.cancelled {
            debug!("timer cancelled with {} queued tasks", q.heap.len());
        }
        q.cancelled = true;
        q.heap.clear();
        self.shared.available.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.queue.lock().cancelled
    }

    /// Remove cancelled tasks from the queue, returning how many were
    /// dropped.
    pub fn purge(&self) -> usize {
        let mut q = self.shared.queue.lock();
        let purged = q.heap.purge_cancelled();
        debug!("timer purge removed {} cancelled tasks", purged);
        purged
    }

    /// Cancel and wait for the timer thread to exit. When called from a
    /// task body on this timer, only cancels.
    pub fn close(mut self) {
        self.cancel();
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("timer thread exited by panic");
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let mut q = self.shared.queue.lock();
        q.finished = true;
        self.shared.available.notify_all();
    }
}

fn check_period(period: Duration) -> Result<()> {
    if period.is_zero() {
        return Err(Error::illegal_argument("period must be positive"));
    }
    Ok(())
}

/// Block until a task is due, update its schedule, and hand it back.
/// Returns `None` when the thread should exit.
fn next_due(shared: &Shared) -> Option<(TimerTask, Instant)> {
    let mut q = shared.queue.lock();
    loop {
        if q.cancelled {
            return None;
        }
        let (when, cancelled) = match q.heap.peek() {
            None if q.finished => return None,
            None => {
                shared.available.wait(&mut q);
                continue;
            }
            Some(p) => (p.when, p.task.is_cancelled()),
        };
        if cancelled {
            q.heap.pop();
            continue;
        }
        let now = Instant::now();
        if when > now {
            shared.available.wait_for(&mut q, when - now);
            continue;
        }
        let Some(due) = q.heap.pop() else {
            continue;
        };
        let mut s = due.task.lock_schedule();
        if s.state == TaskState::Cancelled {
            continue;
        }
        s.last_scheduled = Some(when);
        let next = match s.period {
            None => None,
            Some(Period::FixedRate(period)) => Some(when.checked_add(period)),
            Some(Period::FixedDelay(period)) => Some(now.checked_add(period)),
        };
        match next {
            None => s.state = TaskState::Executed,
            Some(Some(at)) => q.heap.push(at, due.task.clone()),
            Some(None) => {
                // Last run of a periodic task whose next deadline is out of range.
                debug!("periodic task dropped: next execution time overflows");
                s.state = TaskState::Executed;
            }
        }
        drop(s);
        return Some((due.task, when));
    }
}

fn dispatch_loop(shared: &Shared) {
    while let Some((task, when)) = next_due(shared) {
        trace!("timer dispatching task due {:?} ago", when.elapsed());
        if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
            error!("timer task panicked; cancelling timer");
            let mut q = shared.queue.lock();
            q.cancelled = true;
            q.heap.clear();
            return;
        }
    }
}
