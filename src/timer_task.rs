//! TimerTask: a unit of work a [`Timer`](crate::Timer) runs once or
//! repeatedly.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

/// Lifecycle of a [`TimerTask`]. Only `Virgin` tasks can be scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Created, never handed to a timer.
    Virgin,
    /// Waiting in a timer's queue (periodic tasks stay here for good).
    Scheduled,
    /// A one-shot task that has been dispatched.
    Executed,
    /// Cancelled through [`TimerTask::cancel`].
    Cancelled,
}

/// How a periodic task is rescheduled after each dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Period {
    /// Next run is `period` after the previous run was dispatched.
    FixedDelay(Duration),
    /// Next run is `period` after the previous run's scheduled time.
    FixedRate(Duration),
}

impl Period {
    pub(crate) fn length(self) -> Duration {
        match self {
            Period::FixedDelay(d) | Period::FixedRate(d) => d,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Schedule {
    pub(crate) state: TaskState,
    pub(crate) period: Option<Period>,
    /// Deadline of the most recent dispatch.
    pub(crate) last_scheduled: Option<Instant>,
}

type Body = Box<dyn FnMut() + Send>;

struct TaskInner {
    schedule: Mutex<Schedule>,
    body: Mutex<Body>,
}

/// A schedulable task. Clones share state, so a clone kept by the caller
/// can cancel the copy held by the timer.
#[derive(Clone)]
pub struct TimerTask {
    inner: Arc<TaskInner>,
}

impl TimerTask {
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            inner: Arc::new(TaskInner {
                schedule: Mutex::new(Schedule {
                    state: TaskState::Virgin,
                    period: None,
                    last_scheduled: None,
                }),
                body: Mutex::new(Box::new(body)),
            }),
        }
    }

    /// Cancel this task. Returns true if that prevented at least one
    /// pending execution; calling it again returns false.
    ///
    /// A body that is already running finishes normally.
    pub fn cancel(&self) -> bool {
        let mut s = self.inner.schedule.lock();
        let prevented = s.state == TaskState::Scheduled;
        s.state = TaskState::Cancelled;
        prevented
    }

    pub fn state(&self) -> TaskState {
        self.inner.schedule.lock().state
    }

    /// Scheduled (not actual) start time of the most recent run, or
    /// `None` if the task has not run yet.
    pub fn scheduled_execution_time(&self) -> Option<Instant> {
        self.inner.schedule.lock().last_scheduled
    }

    pub(crate) fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.inner.schedule.lock()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Run the body on the calling thread.
    pub(crate) fn run(&self) {
        let mut body = self.inner.body.lock();
        let f: &mut (dyn FnMut() + Send) = &mut **body;
        f();
    }

    #[cfg(test)]
    pub(crate) fn same_task(&self, other: &TimerTask) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner.schedule.lock();
        f.debug_struct("TimerTask")
            .field("state", &s.state)
            .field("period", &s.period)
            .field("last_scheduled", &s.last_scheduled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cancel_is_idempotent() {
        let t = TimerTask::new(|| {});
        assert_eq!(t.state(), TaskState::Virgin);
        assert!(!t.cancel(), "nothing was pending");
        assert_eq!(t.state(), TaskState::Cancelled);

        let t = TimerTask::new(|| {});
        t.lock_schedule().state = TaskState::Scheduled;
        assert!(t.cancel());
        assert!(!t.cancel());
        assert!(t.is_cancelled());
    }

    #[test]
    fn clones_share_state_and_body() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let t = TimerTask::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let c = t.clone();
        t.run();
        c.run();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(t.same_task(&c));
        assert!(!t.same_task(&TimerTask::new(|| {})));
        c.cancel();
        assert_eq!(t.state(), TaskState::Cancelled);
        assert_eq!(t.scheduled_execution_time(), None);
    }
}
