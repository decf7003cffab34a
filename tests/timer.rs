// Timer / TimerTask integration suite.
//
// Timing assertions only bound times from below (a task never runs
// early) and use generous upper timeouts, so the suite tolerates slow CI
// machines.
mod common;

use chained_collections::{Error, Start, TaskState, Timer, TimerConfig, TimerTask};
use parking_lot::Mutex;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

const PATIENCE: Duration = Duration::from_secs(10);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn recv_n<T>(rx: &Receiver<T>, n: usize) -> Vec<T> {
    (0..n)
        .map(|_| rx.recv_timeout(PATIENCE).expect("timer stalled"))
        .collect()
}

// Test: deadlines [50, 10, 30] ms execute as 10, 30, 50, none early.
#[test]
fn one_shot_tasks_run_in_deadline_order() {
    common::init_test_logger();
    let timer = Timer::new().unwrap();
    let (tx, rx) = channel();
    let t0 = Instant::now();
    let tasks: Vec<TimerTask> = [50u64, 10, 30]
        .into_iter()
        .map(|d| {
            let tx = tx.clone();
            let task = TimerTask::new(move || {
                let _ = tx.send((d, Instant::now()));
            });
            timer.schedule(&task, ms(d)).unwrap();
            task
        })
        .collect();

    let runs = recv_n(&rx, 3);
    let order: Vec<u64> = runs.iter().map(|(d, _)| *d).collect();
    assert_eq!(order, vec![10, 30, 50]);
    for (d, at) in runs {
        assert!(at >= t0 + ms(d), "task {d} ran early");
    }
    assert!(tasks.iter().all(|t| t.state() == TaskState::Executed));
    assert!(tasks.iter().all(|t| t.scheduled_execution_time().is_some()));
    timer.close();
}

// Test: fixed rate keeps the nominal schedule and catches up.
// A 150 ms body on a 100 ms period sees scheduled times t0+100, t0+200,
// t0+300 even though runs start late.
#[test]
fn fixed_rate_catches_up() {
    common::init_test_logger();
    let timer = Timer::new().unwrap();
    let (tx, rx) = channel();
    let me: Arc<OnceLock<TimerTask>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&me);
    let task = TimerTask::new(move || {
        let scheduled = slot.get().and_then(TimerTask::scheduled_execution_time);
        let _ = tx.send((scheduled, Instant::now()));
        thread::sleep(ms(150));
    });
    me.set(task.clone()).unwrap();

    let t0 = Instant::now();
    timer
        .schedule_at_fixed_rate(&task, Start::At(t0 + ms(100)), ms(100))
        .unwrap();
    let runs = recv_n(&rx, 3);
    task.cancel();
    for (i, (scheduled, started)) in runs.into_iter().enumerate() {
        let nominal = t0 + ms(100 * (i as u64 + 1));
        assert_eq!(scheduled, Some(nominal));
        assert!(started >= nominal);
    }
    timer.close();
}

// Test: fixed delay never catches up; starts are spaced by at least the
// body's 150 ms duration.
#[test]
fn fixed_delay_spaces_runs() {
    common::init_test_logger();
    let timer = Timer::new().unwrap();
    let (tx, rx) = channel();
    let task = TimerTask::new(move || {
        let _ = tx.send(Instant::now());
        thread::sleep(ms(150));
    });
    timer
        .schedule_with_fixed_delay(&task, ms(10), ms(100))
        .unwrap();
    let starts = recv_n(&rx, 3);
    assert!(task.cancel());
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= ms(150));
    }
    timer.close();
}

// Test: a panicking body cancels the timer.
// Verifies: later scheduling fails with TimerCancelled; queued tasks keep
// their state.
#[test]
fn panicking_task_cancels_the_timer() {
    common::init_test_logger();
    let timer = Timer::with_config(TimerConfig::new().name("panicky")).unwrap();
    let waiting = TimerTask::new(|| {});
    timer.schedule(&waiting, Duration::from_secs(3600)).unwrap();
    let boom = TimerTask::new(|| panic!("task failure"));
    timer.schedule(&boom, Duration::ZERO).unwrap();

    let deadline = Instant::now() + PATIENCE;
    while !timer.is_cancelled() {
        assert!(Instant::now() < deadline, "timer never cancelled");
        thread::sleep(ms(5));
    }
    let late = TimerTask::new(|| {});
    assert_eq!(timer.schedule(&late, Duration::ZERO), Err(Error::TimerCancelled));
    assert_eq!(waiting.state(), TaskState::Scheduled);
    timer.close();
}

// Test: cancel and purge are idempotent.
#[test]
fn cancel_and_purge_are_idempotent() {
    let timer = Timer::new().unwrap();
    let tasks: Vec<TimerTask> = (0..5).map(|_| TimerTask::new(|| {})).collect();
    for t in &tasks {
        timer.schedule(t, Duration::from_secs(3600)).unwrap();
    }
    assert_eq!(timer.purge(), 0, "nothing cancelled yet");

    assert!(tasks[1].cancel());
    assert!(!tasks[1].cancel());
    assert!(tasks[3].cancel());
    assert_eq!(timer.purge(), 2);
    assert_eq!(timer.purge(), 0);

    timer.cancel();
    timer.cancel();
    assert!(timer.is_cancelled());
    assert_eq!(timer.purge(), 0);
    assert_eq!(tasks[0].state(), TaskState::Scheduled);
    assert_eq!(
        timer.schedule_at_fixed_rate(&tasks[0], ms(1), ms(1)),
        Err(Error::TimerCancelled)
    );
    timer.close();
}

// Test: a task is scheduled at most once, on at most one timer.
#[test]
fn tasks_cannot_be_rescheduled() {
    let a = Timer::new().unwrap();
    let b = Timer::new().unwrap();
    let task = TimerTask::new(|| {});
    a.schedule(&task, Duration::from_secs(3600)).unwrap();
    assert_eq!(b.schedule(&task, ms(1)), Err(Error::TaskAlreadyScheduled));

    let cancelled = TimerTask::new(|| {});
    cancelled.cancel();
    assert_eq!(b.schedule(&cancelled, ms(1)), Err(Error::TaskAlreadyScheduled));
    assert_eq!(
        b.schedule_with_fixed_delay(&TimerTask::new(|| {}), ms(1), Duration::ZERO),
        Err(Error::IllegalArgument("period must be positive".to_string()))
    );
    a.close();
    b.close();
}

// Test: dropping a timer without closing it still runs queued one-shots.
#[test]
fn dropped_timer_drains_queued_work() {
    let (tx, rx) = channel();
    {
        let timer = Timer::new().unwrap();
        let task = TimerTask::new(move || {
            let _ = tx.send("done");
        });
        timer.schedule(&task, ms(30)).unwrap();
    }
    assert_eq!(rx.recv_timeout(PATIENCE), Ok("done"));
}

// Test: bodies can schedule more work on their own timer.
// Verifies: no scheduler lock is held while a body runs.
#[test]
fn body_can_schedule_follow_up_work() {
    let timer = Arc::new(Timer::new().unwrap());
    let (tx, rx) = channel();
    let weak: Weak<Timer> = Arc::downgrade(&timer);
    let follow_tx = tx.clone();
    let first = TimerTask::new(move || {
        let _ = tx.send("first");
        if let Some(t) = weak.upgrade() {
            let tx = follow_tx.clone();
            let next = TimerTask::new(move || {
                let _ = tx.send("second");
            });
            t.schedule(&next, Duration::ZERO).unwrap();
        }
    });
    timer.schedule(&first, ms(5)).unwrap();
    assert_eq!(recv_n(&rx, 2), vec!["first", "second"]);
    timer.cancel();
}

// Test: out-of-range deadlines and periods are rejected up front.
// Verifies: the task stays Virgin, the timer keeps running and later work
// still executes.
#[test]
fn overflowing_times_are_rejected_synchronously() {
    common::init_test_logger();
    let timer = Timer::new().unwrap();
    let task = TimerTask::new(|| {});
    assert_eq!(
        timer.schedule(&task, Duration::MAX),
        Err(Error::IllegalArgument("execution time overflows".to_string()))
    );
    let overflowing_period: Result<(), Error> = Err(Error::IllegalArgument(
        "period overflows execution time".to_string(),
    ));
    assert_eq!(
        timer.schedule_at_fixed_rate(&task, Duration::ZERO, Duration::MAX),
        overflowing_period
    );
    assert_eq!(
        timer.schedule_with_fixed_delay(&task, Duration::ZERO, Duration::MAX),
        overflowing_period
    );
    assert_eq!(task.state(), TaskState::Virgin);

    let (tx, rx) = channel();
    let follow_up = TimerTask::new(move || {
        let _ = tx.send("ran");
    });
    timer.schedule(&follow_up, Duration::ZERO).unwrap();
    assert_eq!(rx.recv_timeout(PATIENCE), Ok("ran"));
    assert!(!timer.is_cancelled());
    timer.close();
}

// Test: a body may close the timer that is running it.
// Verifies: close skips joining its own thread instead of deadlocking.
#[test]
fn close_from_own_body_returns() {
    common::init_test_logger();
    let slot: Arc<Mutex<Option<Timer>>> = Arc::new(Mutex::new(Some(Timer::new().unwrap())));
    let (tx, rx) = channel();
    let inner = Arc::clone(&slot);
    let task = TimerTask::new(move || {
        if let Some(timer) = inner.lock().take() {
            timer.close();
            let _ = tx.send("closed");
        }
    });
    {
        // The body blocks on the slot until scheduling is done.
        let guard = slot.lock();
        guard.as_ref().unwrap().schedule(&task, Duration::ZERO).unwrap();
    }
    assert_eq!(rx.recv_timeout(PATIENCE), Ok("closed"));
    assert!(slot.lock().is_none());
    assert_eq!(task.state(), TaskState::Executed);
}
