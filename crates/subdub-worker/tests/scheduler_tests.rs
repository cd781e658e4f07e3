//! Job scheduler tests with a controllable job runner.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use subdub_models::{Job, JobConfig, JobId, JobStatus, PipelineMode, ProgressEvent, Step};
use subdub_worker::{
    EventSink, JobFailure, JobRunner, JobScheduler, QueueStats, WorkerConfig, WorkerError,
};

/// Runner that holds every job until the test releases a permit.
struct GatedRunner {
    gate: Semaphore,
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<JobId>>,
    /// Keep running after cancellation and report success
    ignore_cancel: AtomicBool,
}

impl GatedRunner {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            ignore_cancel: AtomicBool::new(false),
        }
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    fn started(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    async fn wait_for_gate(&self, cancel: &CancellationToken) -> bool {
        if self.ignore_cancel.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            return true;
        }
        tokio::select! {
            permit = self.gate.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
                true
            }
            _ = cancel.cancelled() => false,
        }
    }
}

#[async_trait]
impl JobRunner for GatedRunner {
    async fn run(
        &self,
        mut job: Job,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Job, JobFailure> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(job.id.clone());

        let _ = events.send(ProgressEvent::step_changed(&job.id, Step::Transcribe, 0.5));
        let released = self.wait_for_gate(cancel).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let name = job.file_name();
        if name.contains("panic") {
            panic!("runner exploded");
        }
        if !released {
            job.cancel();
            return Err(JobFailure {
                job,
                error: WorkerError::Cancelled,
            });
        }
        if name.contains("bad") {
            let error = WorkerError::translation_failed("no such language pair");
            job.fail(error.to_string(), Default::default());
            return Err(JobFailure { job, error });
        }
        job.succeed(Default::default());
        Ok(job)
    }
}

fn jobs(names: &[&str]) -> Vec<Job> {
    names
        .iter()
        .map(|n| Job::new(format!("/videos/{n}.mp4"), JobConfig::default()))
        .collect()
}

fn scheduler(runner: &Arc<GatedRunner>) -> JobScheduler {
    let runner: Arc<dyn JobRunner> = runner.clone();
    JobScheduler::new(runner, &WorkerConfig::default())
}

async fn wait_for(scheduler: &JobScheduler, cond: impl Fn(&QueueStats) -> bool) -> QueueStats {
    for _ in 0..300 {
        let stats = scheduler.stats().await.unwrap();
        if cond(&stats) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached: {:?}", scheduler.stats().await.unwrap());
}

#[tokio::test]
async fn test_concurrency_bound_and_refill() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    scheduler.submit(jobs(&["a", "b", "c", "d", "e"])).await.unwrap();

    assert_eq!(scheduler.start(2).await.unwrap(), 2);
    let stats = wait_for(&scheduler, |s| s.running == 2).await;
    assert_eq!(stats.pending, 3);
    assert!(stats.processing);

    runner.release(1);
    let stats = wait_for(&scheduler, |s| s.succeeded == 1 && s.running == 2).await;
    assert_eq!(stats.pending, 2);

    runner.release(10);
    let stats = wait_for(&scheduler, |s| s.succeeded == 5).await;
    assert!(!stats.processing);
    assert_eq!(runner.max_running.load(Ordering::SeqCst), 2);
    assert_eq!(runner.started(), 5);
}

#[tokio::test]
async fn test_zero_concurrency_runs_one_at_a_time() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    scheduler.submit(jobs(&["a", "b", "c"])).await.unwrap();

    assert_eq!(scheduler.start(0).await.unwrap(), 1);
    runner.release(3);
    wait_for(&scheduler, |s| s.succeeded == 3).await;
    assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_running_job_leaves_others_alone() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["a", "b", "c"])).await.unwrap();
    scheduler.start(3).await.unwrap();
    wait_for(&scheduler, |s| s.running == 3).await;

    assert!(scheduler.cancel(&ids[0]).await.unwrap());
    let cancelled = scheduler.job(&ids[0]).await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.finished_at.is_some());

    runner.release(2);
    let stats = wait_for(&scheduler, |s| !s.processing).await;
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.cancelled, 1);

    // Already terminal.
    assert!(!scheduler.cancel(&ids[0]).await.unwrap());
    assert!(!scheduler.cancel(&ids[1]).await.unwrap());
}

#[tokio::test]
async fn test_late_result_does_not_overwrite_cancellation() {
    let runner = Arc::new(GatedRunner::new());
    runner.ignore_cancel.store(true, Ordering::SeqCst);
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["a", "b"])).await.unwrap();
    scheduler.start(1).await.unwrap();
    wait_for(&scheduler, |s| s.running == 1).await;

    scheduler.cancel(&ids[0]).await.unwrap();
    // The slot stays taken until the runner returns.
    assert_eq!(runner.started(), 1);

    runner.release(2);
    wait_for(&scheduler, |s| !s.processing).await;
    let first = scheduler.job(&ids[0]).await.unwrap().unwrap();
    let second = scheduler.job(&ids[1]).await.unwrap().unwrap();
    assert_eq!(first.status, JobStatus::Cancelled);
    assert_eq!(second.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_cancelled_pending_job_never_starts() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["a", "b"])).await.unwrap();
    scheduler.start(1).await.unwrap();

    assert!(scheduler.cancel(&ids[1]).await.unwrap());
    runner.release(1);
    let stats = wait_for(&scheduler, |s| !s.processing).await;

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(runner.started(), 1);
}

#[tokio::test]
async fn test_stop_cancels_running_and_keeps_pending() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    scheduler.submit(jobs(&["a", "b", "c"])).await.unwrap();
    scheduler.start(1).await.unwrap();
    wait_for(&scheduler, |s| s.running == 1).await;

    scheduler.stop().await.unwrap();
    let stats = wait_for(&scheduler, |s| !s.processing).await;
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.pending, 2);

    runner.release(5);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runner.started(), 1);
    assert!(!scheduler.is_processing().await.unwrap());
}

#[tokio::test]
async fn test_failures_and_success_rate() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["good", "bad"])).await.unwrap();
    scheduler.start(2).await.unwrap();
    runner.release(2);

    let stats = wait_for(&scheduler, |s| s.finished() == 2).await;
    assert_eq!(stats.failed, 1);
    assert!((scheduler.success_rate().await.unwrap() - 0.5).abs() < 1e-9);
    assert!((stats.overall_progress - 1.0).abs() < 1e-9);

    let failed = scheduler.job(&ids[1]).await.unwrap().unwrap();
    assert!(failed.error.unwrap().contains("no such language pair"));
}

#[tokio::test]
async fn test_panicking_runner_fails_job() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["panic", "ok"])).await.unwrap();
    scheduler.start(1).await.unwrap();
    runner.release(2);

    let stats = wait_for(&scheduler, |s| s.finished() == 2).await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 1);
    let job = scheduler.job(&ids[0]).await.unwrap().unwrap();
    assert!(job.error.unwrap().contains("panicked"));
}

#[tokio::test]
async fn test_overall_progress_tracks_running_jobs() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    scheduler.submit(jobs(&["a", "b"])).await.unwrap();
    assert_eq!(scheduler.overall_progress().await.unwrap(), 0.0);

    scheduler.start(1).await.unwrap();
    let stats = wait_for(&scheduler, |s| s.overall_progress > 0.0).await;
    assert!((stats.overall_progress - 0.25).abs() < 1e-9);

    runner.release(2);
    let stats = wait_for(&scheduler, |s| s.succeeded == 2).await;
    assert!((stats.overall_progress - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_events_end_with_idle() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let mut events = scheduler.subscribe();
    let ids = scheduler.submit(jobs(&["a"])).await.unwrap();
    scheduler.start(1).await.unwrap();
    runner.release(1);

    let mut seen = Vec::new();
    let received = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            let idle = event == ProgressEvent::Idle;
            seen.push(event);
            if idle {
                break;
            }
        }
    })
    .await;
    assert!(received.is_ok());

    assert!(seen.contains(&ProgressEvent::step_changed(&ids[0], Step::Transcribe, 0.5)));
    assert!(seen.contains(&ProgressEvent::finished(&ids[0], JobStatus::Succeeded, None)));
    let finished = seen
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Finished { .. }))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_list_management() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["a", "b", "c"])).await.unwrap();

    assert!(scheduler.remove(&ids[2]).await.unwrap());
    assert!(!scheduler.remove(&ids[2]).await.unwrap());
    assert_eq!(scheduler.jobs().await.unwrap().len(), 2);

    let subtitles = JobConfig::default().with_mode(PipelineMode::SubtitlesOnly);
    assert_eq!(scheduler.update_pending_config(subtitles).await.unwrap(), 2);
    assert_eq!(
        scheduler
            .jobs_with_mode(PipelineMode::SubtitlesOnly)
            .await
            .unwrap()
            .len(),
        2
    );

    scheduler.start(2).await.unwrap();
    runner.release(2);
    wait_for(&scheduler, |s| s.succeeded == 2).await;
    assert_eq!(
        scheduler
            .jobs_with_status(JobStatus::Succeeded)
            .await
            .unwrap()
            .len(),
        2
    );

    assert_eq!(scheduler.remove_finished().await.unwrap(), 2);
    assert!(scheduler.jobs().await.unwrap().is_empty());

    scheduler.submit(jobs(&["d"])).await.unwrap();
    scheduler.remove_all().await.unwrap();
    assert_eq!(scheduler.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_remove_all_reports_running_jobs_cancelled() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    let ids = scheduler.submit(jobs(&["a", "b"])).await.unwrap();
    scheduler.start(1).await.unwrap();
    wait_for(&scheduler, |s| s.running == 1).await;

    let mut events = scheduler.subscribe();
    scheduler.remove_all().await.unwrap();

    let mut seen = Vec::new();
    let received = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            let idle = event == ProgressEvent::Idle;
            seen.push(event);
            if idle {
                break;
            }
        }
    })
    .await;
    assert!(received.is_ok());

    let finished: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Finished { .. }))
        .collect();
    assert_eq!(
        finished,
        vec![&ProgressEvent::finished(&ids[0], JobStatus::Cancelled, None)]
    );
    assert_eq!(scheduler.stats().await.unwrap().total, 0);
    assert_eq!(runner.started(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_handle() {
    let runner = Arc::new(GatedRunner::new());
    let scheduler = scheduler(&runner);
    scheduler.shutdown().await.unwrap();

    let err = scheduler.jobs().await.unwrap_err();
    assert!(matches!(err, WorkerError::SchedulerClosed));
}
