//! End-to-end behavior of the scheduler against real timers.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conveyor_core::{
    FnTask, QueueConfig, QueueStatus, Scheduler, TaskError, TaskResult, TaskStatus,
};
use serde_json::json;
use tokio::time::{sleep, timeout};

fn sleeper(id: &str, ms: u64) -> FnTask {
    FnTask::builder(id)
        .execute(move || async move {
            sleep(Duration::from_millis(ms)).await;
            Ok(json!(null))
        })
        .build()
        .unwrap()
}

/// Task that bumps `started` when its body begins.
fn counted(id: &str, ms: u64, started: &Arc<AtomicU32>) -> FnTask {
    let started = Arc::clone(started);
    FnTask::builder(id)
        .execute(move || {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(ms)).await;
                Ok(json!(null))
            }
        })
        .build()
        .unwrap()
}

fn collect_results(scheduler: &Scheduler) -> Arc<Mutex<Vec<TaskResult>>> {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    scheduler.on_task_complete(move |r| sink.lock().unwrap().push(r.clone()));
    results
}

async fn wait_until<F>(scheduler: &Scheduler, predicate: F) -> QueueStatus
where
    F: FnMut(&QueueStatus) -> bool,
{
    timeout(Duration::from_secs(3), scheduler.wait_for_status(predicate))
        .await
        .expect("timed out waiting for scheduler status")
}

#[tokio::test]
async fn fifo_order_when_priority_disabled() {
    let scheduler = Scheduler::new(QueueConfig::new(1).with_priority(false)).unwrap();
    let results = collect_results(&scheduler);

    scheduler.add(sleeper("1", 30)).unwrap();
    scheduler.add(sleeper("2", 10)).unwrap();
    scheduler.add(sleeper("3", 5)).unwrap();
    scheduler.start();

    wait_until(&scheduler, |s| s.completed == 3).await;

    let order: Vec<String> = results
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(order, vec!["1", "2", "3"]);
    assert_eq!(
        scheduler.status(),
        QueueStatus {
            pending: 0,
            running: 0,
            completed: 3,
            failed: 0
        }
    );
}

#[tokio::test]
async fn respects_max_concurrent() {
    let scheduler = Scheduler::new(QueueConfig::new(2)).unwrap();
    let running_now = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    for id in ["1", "2", "3", "4"] {
        let running_now = Arc::clone(&running_now);
        let max_observed = Arc::clone(&max_observed);
        let task = FnTask::builder(id)
            .execute(move || {
                let running_now = Arc::clone(&running_now);
                let max_observed = Arc::clone(&max_observed);
                async move {
                    let now = running_now.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    running_now.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(null))
                }
            })
            .build()
            .unwrap();
        scheduler.add(task).unwrap();
    }
    scheduler.start();

    let status = wait_until(&scheduler, |s| s.completed == 4).await;

    assert_eq!(max_observed.load(Ordering::SeqCst), 2);
    assert_eq!(status.failed, 0);
    assert_eq!(scheduler.stats().peak_running, 2);
}

#[tokio::test]
async fn failure_is_reported_and_queue_continues() {
    let scheduler = Scheduler::new(QueueConfig::new(1)).unwrap();
    let results = collect_results(&scheduler);

    let bad = FnTask::builder("bad")
        .execute(|| async {
            sleep(Duration::from_millis(10)).await;
            Err::<serde_json::Value, TaskError>("boom".into())
        })
        .build()
        .unwrap();
    let good = FnTask::builder("good")
        .execute(|| async {
            sleep(Duration::from_millis(10)).await;
            Ok(json!(123))
        })
        .build()
        .unwrap();

    scheduler.add(bad).unwrap();
    scheduler.add(good).unwrap();
    scheduler.start();

    let status = wait_until(&scheduler, |s| s.finished() == 2).await;
    assert_eq!(status.failed, 1);
    assert_eq!(status.completed, 1);

    let results = results.lock().unwrap();
    let bad = results.iter().find(|r| r.id.as_str() == "bad").unwrap();
    let good = results.iter().find(|r| r.id.as_str() == "good").unwrap();

    assert_eq!(bad.status, TaskStatus::Failed);
    assert!(bad.error.as_deref().unwrap().contains("boom"));
    assert!(bad.result.is_none());

    assert_eq!(good.status, TaskStatus::Completed);
    assert_eq!(good.result, Some(json!(123)));
    assert!(good.error.is_none());
}

#[tokio::test]
async fn retried_task_reports_once() {
    let scheduler = Scheduler::new(QueueConfig::new(1).with_max_retries(3)).unwrap();
    let results = collect_results(&scheduler);
    let calls = Arc::new(AtomicU32::new(0));

    let task = {
        let calls = Arc::clone(&calls);
        FnTask::builder("flaky")
            .execute(move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".into())
                    } else {
                        Ok(json!({ "processed": true }))
                    }
                }
            })
            .build()
            .unwrap()
    };
    scheduler.add(task).unwrap();
    scheduler.start();

    let status = wait_until(&scheduler, |s| s.finished() == 1 && s.running == 0).await;
    // give any stray report a chance to show up
    sleep(Duration::from_millis(20)).await;

    assert_eq!(status.completed, 1);
    assert_eq!(status.failed, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, TaskStatus::Completed);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(results[0].result, Some(json!({ "processed": true })));
}

#[tokio::test]
async fn pause_blocks_new_starts_and_resume_continues() {
    let scheduler = Scheduler::new(QueueConfig::new(2)).unwrap();
    let started = Arc::new(AtomicU32::new(0));

    for id in ["1", "2", "3", "4"] {
        scheduler.add(counted(id, 60, &started)).unwrap();
    }
    scheduler.start();

    sleep(Duration::from_millis(10)).await;
    scheduler.pause();

    sleep(Duration::from_millis(30)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);

    // the first two finish while paused; nothing new is admitted
    let paused = wait_until(&scheduler, |s| s.completed == 2).await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(paused.pending, 2);
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.status().running, 0);

    scheduler.resume();
    let status = wait_until(&scheduler, |s| s.completed == 4).await;

    assert_eq!(started.load(Ordering::SeqCst), 4);
    assert_eq!(status.failed, 0);
}

#[tokio::test]
async fn stop_lets_running_tasks_finish_and_keeps_the_rest_pending() {
    let scheduler = Scheduler::new(QueueConfig::new(2)).unwrap();
    let started = Arc::new(AtomicU32::new(0));

    for id in ["1", "2", "3", "4"] {
        scheduler.add(counted(id, 80, &started)).unwrap();
    }
    scheduler.start();
    sleep(Duration::from_millis(10)).await;

    scheduler.stop();
    sleep(Duration::from_millis(120)).await;

    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(
        scheduler.status(),
        QueueStatus {
            pending: 2,
            running: 0,
            completed: 2,
            failed: 0
        }
    );
}

#[tokio::test]
async fn observer_panics_are_isolated() {
    let scheduler = Scheduler::new(QueueConfig::new(2)).unwrap();
    scheduler.on_task_complete(|_| panic!("observer failure"));
    let results = collect_results(&scheduler);

    scheduler.add(sleeper("a", 5)).unwrap();
    scheduler.add(sleeper("b", 5)).unwrap();
    scheduler.start();

    let status = wait_until(&scheduler, |s| s.completed == 2 && s.running == 0).await;

    assert_eq!(status.failed, 0);
    assert_eq!(results.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn observers_see_counters_already_updated() {
    let scheduler = Scheduler::new(QueueConfig::new(1)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let handle = scheduler.clone();
        let seen = Arc::clone(&seen);
        scheduler.on_task_complete(move |_| {
            seen.lock().unwrap().push(handle.status().completed);
        });
    }

    scheduler.add(sleeper("a", 5)).unwrap();
    scheduler.add(sleeper("b", 5)).unwrap();
    scheduler.start();
    wait_until(&scheduler, |s| s.completed == 2).await;
    sleep(Duration::from_millis(10)).await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn tasks_added_while_running_are_dispatched() {
    let scheduler = Scheduler::new(QueueConfig::new(1)).unwrap();
    scheduler.start();

    scheduler.add(sleeper("early", 20)).unwrap();
    assert_eq!(scheduler.status().running, 1);

    scheduler.add(sleeper("late", 5)).unwrap();
    assert_eq!(scheduler.status().pending, 1);

    let status = timeout(Duration::from_secs(2), scheduler.wait_idle())
        .await
        .unwrap();
    assert_eq!(status.completed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_idle_resolves_only_after_observers_return() {
    let scheduler = Scheduler::new(QueueConfig::new(2)).unwrap();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let held_slot = Arc::new(AtomicU32::new(0));
    {
        let handle = scheduler.clone();
        let delivered = Arc::clone(&delivered);
        let held_slot = Arc::clone(&held_slot);
        scheduler.on_task_complete(move |r| {
            // the reporting task still occupies its slot
            let status = handle.status();
            if status.running >= 1 && status.finished() >= 1 {
                held_slot.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(30));
            delivered.lock().unwrap().push(r.id.to_string());
        });
    }

    scheduler.add(sleeper("a", 5)).unwrap();
    scheduler.add(sleeper("b", 5)).unwrap();
    scheduler.start();

    let status = timeout(Duration::from_secs(3), scheduler.wait_idle())
        .await
        .expect("scheduler never went idle");

    assert_eq!(status.completed, 2);
    let mut delivered = delivered.lock().unwrap().clone();
    delivered.sort();
    assert_eq!(delivered, vec!["a", "b"]);
    assert_eq!(held_slot.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrency_bound_holds_across_worker_threads() {
    const TASKS: usize = 200;
    const LIMIT: usize = 3;

    let scheduler = Scheduler::new(QueueConfig::new(LIMIT)).unwrap();
    let running_now = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    for i in 0..TASKS {
        let running_now = Arc::clone(&running_now);
        let max_observed = Arc::clone(&max_observed);
        let task = FnTask::builder(format!("t{i}"))
            .execute(move || {
                let running_now = Arc::clone(&running_now);
                let max_observed = Arc::clone(&max_observed);
                async move {
                    let now = running_now.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(1)).await;
                    running_now.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(null))
                }
            })
            .build()
            .unwrap();
        scheduler.add(task).unwrap();
    }

    // every snapshot published along the way must respect the bound
    let mut rx = scheduler.watch_status();
    let watcher = tokio::spawn(async move {
        let mut peak = 0;
        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            peak = peak.max(status.running);
            if status.is_idle() {
                break;
            }
        }
        peak
    });

    scheduler.start();
    let status = timeout(Duration::from_secs(10), scheduler.wait_idle())
        .await
        .expect("scheduler never went idle");

    assert_eq!(status.completed, TASKS as u64);
    assert!(max_observed.load(Ordering::SeqCst) <= LIMIT);
    assert!(scheduler.stats().peak_running <= LIMIT);
    assert_eq!(scheduler.stats().total_dispatched, TASKS as u64);

    let snapshot_peak = timeout(Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert!(snapshot_peak <= LIMIT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn outcomes_are_counted_exactly_once_across_worker_threads() {
    const TASKS: u32 = 120;

    let scheduler = Scheduler::new(QueueConfig::new(4).with_max_retries(1)).unwrap();
    let results = collect_results(&scheduler);

    for i in 0..TASKS {
        let calls = Arc::new(AtomicU32::new(0));
        let task = FnTask::builder(format!("t{i}"))
            .execute(move || {
                let calls = Arc::clone(&calls);
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(1)).await;
                    match i % 3 {
                        // always fails: one retry, then a terminal failure
                        0 => Err::<serde_json::Value, TaskError>("always".into()),
                        // fails once, then recovers on the retry
                        1 if call == 0 => Err("once".into()),
                        _ => Ok(json!(i)),
                    }
                }
            })
            .build()
            .unwrap();
        scheduler.add(task).unwrap();
    }
    scheduler.start();

    let status = timeout(Duration::from_secs(10), scheduler.wait_idle())
        .await
        .expect("scheduler never went idle");

    let always_failing = u64::from(TASKS.div_ceil(3));
    assert_eq!(status.finished(), u64::from(TASKS));
    assert_eq!(status.failed, always_failing);
    assert_eq!(status.completed, u64::from(TASKS) - always_failing);
    assert_eq!(status.running, 0);

    let results = results.lock().unwrap();
    assert_eq!(results.len(), TASKS as usize);
    let mut ids: Vec<String> = results.iter().map(|r| r.id.to_string()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), TASKS as usize);

    // each always-failing task and each once-failing task was retried once
    let once_failing = (0..TASKS).filter(|i| i % 3 == 1).count() as u64;
    assert_eq!(
        scheduler.stats().total_retries,
        always_failing + once_failing
    );
}
