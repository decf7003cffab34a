use chained_collections::{Timer, TimerTask};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

// Enqueue cost only: far-future deadlines so nothing dispatches.
fn bench_schedule_10k(c: &mut Criterion) {
    c.bench_function("timer::schedule_10k_far_future", |b| {
        b.iter_batched(
            || {
                let tasks: Vec<TimerTask> = (0..10_000).map(|_| TimerTask::new(|| {})).collect();
                (Timer::new().unwrap(), tasks)
            },
            |(timer, tasks)| {
                for (t, x) in tasks.iter().zip(lcg(3)) {
                    let delay = Duration::from_secs(3600 + x % 3600);
                    timer.schedule(t, delay).unwrap();
                }
                timer.close();
                black_box(tasks)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_purge_half_10k(c: &mut Criterion) {
    c.bench_function("timer::purge_5k_of_10k", |b| {
        b.iter_batched(
            || {
                let timer = Timer::new().unwrap();
                let tasks: Vec<TimerTask> = (0..10_000).map(|_| TimerTask::new(|| {})).collect();
                for t in &tasks {
                    timer.schedule(t, Duration::from_secs(3600)).unwrap();
                }
                for t in tasks.iter().step_by(2) {
                    t.cancel();
                }
                (timer, tasks)
            },
            |(timer, tasks)| {
                black_box(timer.purge());
                timer.close();
                black_box(tasks)
            },
            BatchSize::SmallInput,
        )
    });
}

// End-to-end dispatch of due tasks through the timer thread.
fn bench_dispatch_1k(c: &mut Criterion) {
    c.bench_function("timer::dispatch_1k_due_now", |b| {
        let timer = Timer::new().unwrap();
        b.iter(|| {
            let hits = Arc::new(AtomicUsize::new(0));
            let (tx, rx) = channel();
            for _ in 0..1_000 {
                let hits = Arc::clone(&hits);
                let tx = tx.clone();
                let task = TimerTask::new(move || {
                    if hits.fetch_add(1, Ordering::Relaxed) == 999 {
                        let _ = tx.send(());
                    }
                });
                timer.schedule(&task, Duration::ZERO).unwrap();
            }
            rx.recv().unwrap();
        });
        timer.close();
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_timer;
    config = bench_config();
    targets = bench_schedule_10k, bench_purge_half_10k, bench_dispatch_1k
}
criterion_main!(benches_timer);
