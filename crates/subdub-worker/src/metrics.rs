//! Scheduler and pipeline metrics.
//!
//! Only the `metrics` facade is used here; installing a recorder is up to the
//! embedding application.

use metrics::{counter, gauge, histogram};
use subdub_models::{JobStatus, PipelineMode, Step};

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "subdub_jobs_submitted_total";
    pub const JOBS_STARTED_TOTAL: &str = "subdub_jobs_started_total";
    pub const JOBS_FINISHED_TOTAL: &str = "subdub_jobs_finished_total";
    pub const JOBS_RUNNING: &str = "subdub_jobs_running";
    pub const JOBS_PENDING: &str = "subdub_jobs_pending";

    // Processing metrics
    pub const STEP_DURATION_SECONDS: &str = "subdub_step_duration_seconds";
    pub const FFMPEG_DURATION_SECONDS: &str = subdub_media::command::FFMPEG_DURATION_SECONDS;
}

/// Record jobs added to the scheduler.
pub fn record_jobs_submitted(count: usize) {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(count as u64);
}

/// Record a job launched by the scheduler.
pub fn record_job_started(mode: PipelineMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

/// Record a job reaching a terminal status.
pub fn record_job_finished(status: JobStatus) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::JOBS_FINISHED_TOTAL, &labels).increment(1);
}

/// Update queue gauges.
pub fn set_queue_depth(running: usize, pending: usize) {
    gauge!(names::JOBS_RUNNING).set(running as f64);
    gauge!(names::JOBS_PENDING).set(pending as f64);
}

/// Record how long a pipeline step took.
pub fn record_step_duration(step: Step, duration_secs: f64) {
    let labels = [("step", step.as_str().to_string())];
    histogram!(names::STEP_DURATION_SECONDS, &labels).record(duration_secs);
}
