//! Job scheduler.
//!
//! A single actor task owns the job list, the FIFO of jobs waiting for a slot
//! and the cancellation tokens of running jobs. [`JobScheduler`] is a cheap
//! handle that sends it commands; readers get snapshots back. Executors report
//! progress to the actor, which applies it to the job list and republishes it
//! on a broadcast channel.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use subdub_models::{Job, JobConfig, JobId, JobStatus, PipelineMode, ProgressEvent};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{EventSink, JobFailure, PipelineExecutor};

/// Something that can run one job to a terminal state.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(
        &self,
        job: Job,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Job, JobFailure>;
}

#[async_trait]
impl JobRunner for PipelineExecutor {
    async fn run(
        &self,
        job: Job,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Job, JobFailure> {
        PipelineExecutor::run(self, job, events, cancel).await
    }
}

/// Counts over the job list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean progress over all jobs, terminal jobs counting as complete
    pub overall_progress: f64,
    /// Whether a `start` is in effect and work remains
    pub processing: bool,
}

impl QueueStats {
    fn from_jobs(jobs: &[Job], processing: bool) -> Self {
        let mut stats = QueueStats {
            total: jobs.len(),
            processing,
            ..Default::default()
        };
        for job in jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Succeeded => stats.succeeded += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.overall_progress = overall_progress(jobs);
        stats
    }

    /// Jobs in a terminal state.
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// Share of finished jobs that succeeded, 0.0 when none finished.
    pub fn success_rate(&self) -> f64 {
        match self.finished() {
            0 => 0.0,
            n => self.succeeded as f64 / n as f64,
        }
    }
}

/// Mean over all jobs of 1.0 for terminal jobs, own progress for running
/// jobs and 0.0 for pending jobs. Failed and cancelled jobs count as 1.0.
pub fn overall_progress(jobs: &[Job]) -> f64 {
    if jobs.is_empty() {
        return 0.0;
    }
    let sum: f64 = jobs
        .iter()
        .map(|job| match job.status {
            JobStatus::Pending => 0.0,
            JobStatus::Running => job.progress,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled => 1.0,
        })
        .sum();
    sum / jobs.len() as f64
}

enum Command {
    Submit {
        jobs: Vec<Job>,
        reply: oneshot::Sender<Vec<JobId>>,
    },
    Start {
        max_concurrent: usize,
        reply: oneshot::Sender<usize>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Cancel {
        id: JobId,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: JobId,
        reply: oneshot::Sender<bool>,
    },
    RemoveFinished {
        reply: oneshot::Sender<usize>,
    },
    RemoveAll {
        reply: oneshot::Sender<()>,
    },
    UpdatePendingConfig {
        config: JobConfig,
        reply: oneshot::Sender<usize>,
    },
    Jobs {
        reply: oneshot::Sender<Vec<Job>>,
    },
    Job {
        id: JobId,
        reply: oneshot::Sender<Option<Job>>,
    },
    Stats {
        reply: oneshot::Sender<QueueStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// How a spawned job ended.
enum RunOutcome {
    Finished(Result<Job, JobFailure>),
    Panicked(String),
}

struct Completion {
    id: JobId,
    outcome: RunOutcome,
}

/// Handle to the scheduler actor.
#[derive(Clone)]
pub struct JobScheduler {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ProgressEvent>,
    default_max_concurrent: usize,
}

impl JobScheduler {
    /// Spawn the scheduler actor on the current tokio runtime.
    pub fn new(runner: Arc<dyn JobRunner>, config: &WorkerConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let actor = SchedulerActor {
            jobs: Vec::new(),
            queue: VecDeque::new(),
            active: HashMap::new(),
            max_concurrent: config.max_concurrent_jobs.max(1),
            processing: false,
            runner,
            events: events.clone(),
            progress_tx,
            done_tx,
        };
        tokio::spawn(actor.run(command_rx, progress_rx, done_rx));

        Self {
            commands,
            events,
            default_max_concurrent: config.max_concurrent_jobs.max(1),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> WorkerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| WorkerError::SchedulerClosed)?;
        rx.await.map_err(|_| WorkerError::SchedulerClosed)
    }

    /// Subscribe to progress and status events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Add jobs to the list. They run on the next `start`.
    pub async fn submit(&self, jobs: Vec<Job>) -> WorkerResult<Vec<JobId>> {
        self.request(|reply| Command::Submit { jobs, reply }).await
    }

    /// Queue every pending job and run up to `max_concurrent` at once.
    ///
    /// Returns how many jobs were launched immediately. Zero is treated as one.
    pub async fn start(&self, max_concurrent: usize) -> WorkerResult<usize> {
        self.request(|reply| Command::Start {
            max_concurrent,
            reply,
        })
        .await
    }

    /// `start` with the configured concurrency.
    pub async fn start_default(&self) -> WorkerResult<usize> {
        self.start(self.default_max_concurrent).await
    }

    /// Cancel every running job and drop the FIFO. Queued jobs stay pending.
    pub async fn stop(&self) -> WorkerResult<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Cancel one job. Returns false if it was unknown or already finished.
    pub async fn cancel(&self, id: &JobId) -> WorkerResult<bool> {
        let id = id.clone();
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    /// Remove a job from the list, cancelling it first if it is running.
    pub async fn remove(&self, id: &JobId) -> WorkerResult<bool> {
        let id = id.clone();
        self.request(|reply| Command::Remove { id, reply }).await
    }

    /// Remove every terminal job. Returns how many were removed.
    pub async fn remove_finished(&self) -> WorkerResult<usize> {
        self.request(|reply| Command::RemoveFinished { reply }).await
    }

    /// Cancel everything and clear the list.
    pub async fn remove_all(&self) -> WorkerResult<()> {
        self.request(|reply| Command::RemoveAll { reply }).await
    }

    /// Replace the configuration of every pending job.
    pub async fn update_pending_config(&self, config: JobConfig) -> WorkerResult<usize> {
        self.request(|reply| Command::UpdatePendingConfig { config, reply })
            .await
    }

    /// Snapshot of all jobs in submission order.
    pub async fn jobs(&self) -> WorkerResult<Vec<Job>> {
        self.request(|reply| Command::Jobs { reply }).await
    }

    pub async fn job(&self, id: &JobId) -> WorkerResult<Option<Job>> {
        let id = id.clone();
        self.request(|reply| Command::Job { id, reply }).await
    }

    pub async fn jobs_with_status(&self, status: JobStatus) -> WorkerResult<Vec<Job>> {
        let mut jobs = self.jobs().await?;
        jobs.retain(|j| j.status == status);
        Ok(jobs)
    }

    pub async fn jobs_with_mode(&self, mode: PipelineMode) -> WorkerResult<Vec<Job>> {
        let mut jobs = self.jobs().await?;
        jobs.retain(|j| j.config.mode == mode);
        Ok(jobs)
    }

    pub async fn stats(&self) -> WorkerResult<QueueStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn overall_progress(&self) -> WorkerResult<f64> {
        Ok(self.stats().await?.overall_progress)
    }

    pub async fn success_rate(&self) -> WorkerResult<f64> {
        Ok(self.stats().await?.success_rate())
    }

    pub async fn is_processing(&self) -> WorkerResult<bool> {
        Ok(self.stats().await?.processing)
    }

    /// Stop all work and end the actor.
    pub async fn shutdown(&self) -> WorkerResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

struct SchedulerActor {
    jobs: Vec<Job>,
    queue: VecDeque<JobId>,
    /// Jobs whose executor has not returned yet
    active: HashMap<JobId, CancellationToken>,
    max_concurrent: usize,
    processing: bool,
    runner: Arc<dyn JobRunner>,
    events: broadcast::Sender<ProgressEvent>,
    progress_tx: EventSink,
    done_tx: mpsc::UnboundedSender<Completion>,
}

impl SchedulerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut progress: mpsc::UnboundedReceiver<ProgressEvent>,
        mut done: mpsc::UnboundedReceiver<Completion>,
    ) {
        debug!("Scheduler started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.stop();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.stop();
                        break;
                    }
                },
                Some(event) = progress.recv() => self.on_progress(event),
                Some(completion) = done.recv() => self.on_completion(completion),
            }
        }
        info!("Scheduler stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit { jobs, reply } => {
                let ids = self.submit(jobs);
                let _ = reply.send(ids);
            }
            Command::Start {
                max_concurrent,
                reply,
            } => {
                let launched = self.start(max_concurrent);
                let _ = reply.send(launched);
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Cancel { id, reply } => {
                let cancelled = self.cancel(&id);
                if cancelled {
                    self.publish_queue_state();
                }
                let _ = reply.send(cancelled);
            }
            Command::Remove { id, reply } => {
                let _ = reply.send(self.remove(&id));
            }
            Command::RemoveFinished { reply } => {
                let before = self.jobs.len();
                self.jobs.retain(|j| !j.is_terminal());
                let removed = before - self.jobs.len();
                if removed > 0 {
                    self.publish_queue_state();
                }
                let _ = reply.send(removed);
            }
            Command::RemoveAll { reply } => {
                self.remove_all();
                let _ = reply.send(());
            }
            Command::UpdatePendingConfig { config, reply } => {
                let mut updated = 0;
                for job in self.jobs.iter_mut().filter(|j| j.status == JobStatus::Pending) {
                    job.config = config.clone();
                    updated += 1;
                }
                let _ = reply.send(updated);
            }
            Command::Jobs { reply } => {
                let _ = reply.send(self.jobs.clone());
            }
            Command::Job { id, reply } => {
                let _ = reply.send(self.find(&id).cloned());
            }
            Command::Stats { reply } => {
                let _ = reply.send(QueueStats::from_jobs(&self.jobs, self.processing));
            }
            Command::Shutdown { reply } => {
                self.stop();
                let _ = reply.send(());
            }
        }
    }

    fn find(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    fn find_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| &j.id == id)
    }

    fn submit(&mut self, jobs: Vec<Job>) -> Vec<JobId> {
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id.clone()).collect();
        metrics::record_jobs_submitted(jobs.len());
        self.jobs.extend(jobs);
        self.publish_queue_state();
        ids
    }

    fn start(&mut self, max_concurrent: usize) -> usize {
        self.max_concurrent = max_concurrent.max(1);

        let queued: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|j| j.can_start())
            .filter(|j| !self.queue.contains(&j.id))
            .map(|j| j.id.clone())
            .collect();
        self.queue.extend(queued);
        self.processing = true;

        info!(
            max_concurrent = self.max_concurrent,
            queued = self.queue.len(),
            "Starting job queue"
        );
        self.publish_queue_state();

        let before = self.active.len();
        self.fill_slots();
        self.active.len().saturating_sub(before)
    }

    /// Launch queued jobs until every slot is taken or the FIFO is empty.
    fn fill_slots(&mut self) {
        while self.active.len() < self.max_concurrent {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(job) = self.find_mut(&id) else {
                continue;
            };
            // Cancelled or removed while waiting.
            if !job.can_start() {
                continue;
            }

            job.start();
            let job = job.clone();
            self.launch(job);
        }

        self.publish_queue_state();
        self.check_idle();
    }

    fn launch(&mut self, job: Job) {
        let id = job.id.clone();
        let token = CancellationToken::new();
        self.active.insert(id.clone(), token.clone());
        metrics::record_job_started(job.config.mode);
        debug!(job_id = %id, "Launching job");

        let runner = Arc::clone(&self.runner);
        let events = self.progress_tx.clone();
        let done = self.done_tx.clone();

        tokio::spawn(async move {
            let handle =
                tokio::spawn(async move { runner.run(job, &events, &token).await });
            let outcome = match handle.await {
                Ok(result) => RunOutcome::Finished(result),
                Err(e) => RunOutcome::Panicked(e.to_string()),
            };
            let _ = done.send(Completion { id, outcome });
        });
    }

    fn check_idle(&mut self) {
        if self.processing && self.queue.is_empty() && self.active.is_empty() {
            self.processing = false;
            info!("Job queue idle");
            self.publish(ProgressEvent::Idle);
            self.publish_queue_state();
        }
    }

    fn on_progress(&mut self, event: ProgressEvent) {
        let (job_id, step, overall) = match &event {
            ProgressEvent::StepChanged {
                job_id,
                step,
                overall,
            }
            | ProgressEvent::Progress {
                job_id,
                step,
                overall,
                ..
            } => (job_id.clone(), *step, *overall),
            // Terminal events are published from completions.
            _ => return,
        };

        let Some(job) = self.find_mut(&job_id) else {
            return;
        };
        if job.status != JobStatus::Running {
            return;
        }
        job.report_progress(step, overall);
        self.publish(event);
    }

    fn on_completion(&mut self, completion: Completion) {
        let Completion { id, outcome } = completion;
        self.active.remove(&id);

        if let Some(index) = self.jobs.iter().position(|j| j.id == id) {
            let current = &mut self.jobs[index];

            if current.status == JobStatus::Cancelled {
                // Cancelled by the scheduler; keep the status, take the outputs.
                let finished = match outcome {
                    RunOutcome::Finished(Ok(job)) => Some(job),
                    RunOutcome::Finished(Err(failure)) => Some(failure.job),
                    RunOutcome::Panicked(_) => None,
                };
                if current.output_files.is_none() {
                    current.output_files = finished.and_then(|j| j.output_files);
                }
            } else {
                let finished = match outcome {
                    RunOutcome::Finished(Ok(job)) => job,
                    RunOutcome::Finished(Err(failure)) => failure.job,
                    RunOutcome::Panicked(msg) => {
                        warn!(job_id = %id, "Job panicked: {}", msg);
                        let mut job = current.clone();
                        job.fail(format!("executor panicked: {msg}"), Default::default());
                        job
                    }
                };
                *current = finished;
                let status = current.status;
                let error = current.error.clone();
                metrics::record_job_finished(status);
                info!(job_id = %id, status = %status, "Job finished");
                self.publish(ProgressEvent::finished(&id, status, error));
            }
        }

        self.fill_slots();
    }

    /// Mark a job cancelled and signal its executor if it is running.
    fn cancel(&mut self, id: &JobId) -> bool {
        let token = self.active.get(id).cloned();
        let Some(job) = self.find_mut(id) else {
            return false;
        };
        if !job.can_cancel() {
            return false;
        }

        if let Some(token) = token {
            token.cancel();
        }
        job.cancel();
        metrics::record_job_finished(JobStatus::Cancelled);
        info!(job_id = %id, "Job cancelled");
        self.publish(ProgressEvent::finished(id, JobStatus::Cancelled, None));
        true
    }

    fn stop(&mut self) {
        let running: Vec<JobId> = self.active.keys().cloned().collect();
        for id in &running {
            self.cancel(id);
        }
        self.queue.clear();
        info!(cancelled = running.len(), "Job queue stopped");
        self.publish_queue_state();
        self.check_idle();
    }

    fn remove(&mut self, id: &JobId) -> bool {
        if self.active.contains_key(id) {
            self.cancel(id);
        }
        self.queue.retain(|q| q != id);

        let before = self.jobs.len();
        self.jobs.retain(|j| &j.id != id);
        let removed = self.jobs.len() != before;
        if removed {
            self.publish_queue_state();
            self.check_idle();
        }
        removed
    }

    fn remove_all(&mut self) {
        let running: Vec<JobId> = self.active.keys().cloned().collect();
        for id in &running {
            self.cancel(id);
        }
        self.queue.clear();
        self.jobs.clear();
        self.publish_queue_state();
        self.check_idle();
    }

    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_queue_state(&self) {
        let running = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        let pending = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count();
        metrics::set_queue_depth(running, pending);
        self.publish(ProgressEvent::QueueChanged { running, pending });
    }
}
