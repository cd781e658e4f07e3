//! Pipeline executor: runs one job's steps in order.
//!
//! The executor walks `job.config.mode.steps()`, threading a [`Stage`] value
//! from step to step. Cancellation is checked before every step and before
//! every per-segment unit inside the translate and speech steps. The job's
//! working directory is created up front and removed on every exit path when
//! the job asks for cleanup.

pub mod stage;
mod steps;
pub mod workspace;

use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;
use tokio_util::sync::CancellationToken;

use subdub_models::{Job, JobId, JobStatus, OutputFiles, ProgressEvent, Step};

use crate::collaborators::Collaborators;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::metrics;
use crate::segmenter::Segmenter;

pub use stage::Stage;
pub use workspace::JobWorkspace;

/// Where executors publish progress events.
pub type EventSink = mpsc::UnboundedSender<ProgressEvent>;

/// A job that did not succeed, with the error that ended it.
///
/// `job` is already terminal (failed or cancelled) and carries the outputs
/// that were produced before the error.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct JobFailure {
    pub job: Job,
    #[source]
    pub error: WorkerError,
}

/// Runs pipeline steps for jobs.
///
/// One executor can serve many jobs concurrently; it holds no per-job state.
pub struct PipelineExecutor {
    collaborators: Collaborators,
    segmenter: Segmenter,
    work_dir_name: String,
    /// Model the recognizer was last initialized with
    recognizer_model: Mutex<Option<String>>,
}

impl PipelineExecutor {
    pub fn new(collaborators: Collaborators, config: &WorkerConfig) -> Self {
        Self {
            collaborators,
            segmenter: Segmenter::default(),
            work_dir_name: config.work_dir_name.clone(),
            recognizer_model: Mutex::new(None),
        }
    }

    /// Use custom segmentation limits.
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Run every step of `job`'s mode.
    ///
    /// Returns the succeeded job, or a [`JobFailure`] holding the failed or
    /// cancelled job.
    pub async fn run(
        &self,
        mut job: Job,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Job, JobFailure> {
        let logger = JobLogger::new(&job.id, job.config.mode.as_str());
        let span = logger.create_span();
        self.run_job(job, events, cancel, &logger)
            .instrument(span)
            .await
    }

    async fn run_job(
        &self,
        mut job: Job,
        events: &EventSink,
        cancel: &CancellationToken,
        logger: &JobLogger,
    ) -> Result<Job, JobFailure> {
        if job.status != JobStatus::Running {
            job.start();
        }
        logger.log_start(&format!("{} ({} steps)", job.file_name(), job.total_steps()));

        if let Err(e) = job.config.validate() {
            return Err(finish_unsuccessful(
                job,
                WorkerError::from(e),
                OutputFiles::default(),
                events,
                logger,
            ));
        }

        let workspace = JobWorkspace::new(&job, &self.work_dir_name);
        let mut outputs = OutputFiles::default();

        let result = match workspace.create().await {
            Ok(()) => {
                self.run_steps(&mut job, &workspace, &mut outputs, events, cancel, logger)
                    .await
            }
            Err(e) => Err(e),
        };

        if job.config.cleanup {
            if let Err(e) = workspace.cleanup().await {
                logger.log_warning(&format!(
                    "Failed to remove working directory {}: {}",
                    workspace.root().display(),
                    e
                ));
            }
        }

        match result {
            Ok(()) => {
                job.succeed(outputs);
                logger.log_completion(&format!(
                    "{} output file(s)",
                    job.output_files.as_ref().map(OutputFiles::count).unwrap_or(0)
                ));
                publish(events, ProgressEvent::finished(&job.id, JobStatus::Succeeded, None));
                Ok(job)
            }
            Err(error) => Err(finish_unsuccessful(job, error, outputs, events, logger)),
        }
    }

    async fn run_steps(
        &self,
        job: &mut Job,
        workspace: &JobWorkspace,
        outputs: &mut OutputFiles,
        events: &EventSink,
        cancel: &CancellationToken,
        logger: &JobLogger,
    ) -> Result<(), WorkerError> {
        let steps = job.steps();
        let count = steps.len();
        let mut stage = Stage::Start;

        for (index, &step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                logger.log_warning(&format!("Cancelled before {}", step.title()));
                return Err(WorkerError::Cancelled);
            }

            let overall = index as f64 / count as f64;
            job.report_progress(step, overall);
            publish(events, ProgressEvent::step_changed(&job.id, step, overall));
            logger.log_step(step, index, count);

            let reporter = StepReporter {
                job_id: &job.id,
                step,
                base: overall,
                events,
            };
            let ctx = steps::StepContext {
                job: &*job,
                workspace,
                cancel,
                reporter,
                logger,
            };

            let started = Instant::now();
            stage = self.advance(step, stage, &ctx, outputs).await?;
            metrics::record_step_duration(step, started.elapsed().as_secs_f64());
        }

        Ok(())
    }
}

/// Publishes within-step progress for one step.
#[derive(Clone, Copy)]
pub(crate) struct StepReporter<'a> {
    job_id: &'a JobId,
    step: Step,
    base: f64,
    events: &'a EventSink,
}

impl StepReporter<'_> {
    /// Report `done` of `total` units finished.
    pub(crate) fn units(&self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let fraction = done as f64 / total as f64;
        let overall = self.base + fraction * self.step.weight();
        publish(
            self.events,
            ProgressEvent::progress(self.job_id, self.step, fraction, overall),
        );
    }
}

fn publish(events: &EventSink, event: ProgressEvent) {
    // The receiver is gone only when nobody is listening anymore.
    let _ = events.send(event);
}

fn finish_unsuccessful(
    mut job: Job,
    error: WorkerError,
    outputs: OutputFiles,
    events: &EventSink,
    logger: &JobLogger,
) -> JobFailure {
    if error.is_cancelled() {
        job.output_files = Some(outputs);
        job.cancel();
        logger.log_warning("Job cancelled");
        publish(events, ProgressEvent::finished(&job.id, JobStatus::Cancelled, None));
    } else {
        logger.log_error(&format!("{} failed: {}", job.current_step.title(), error));
        job.fail(error.to_string(), outputs);
        publish(
            events,
            ProgressEvent::finished(&job.id, JobStatus::Failed, job.error.clone()),
        );
    }
    JobFailure { job, error }
}
