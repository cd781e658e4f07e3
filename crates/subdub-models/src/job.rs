//! Job definitions and lifecycle transitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{JobConfig, OutputFiles, Step};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker slot
    #[default]
    Pending,
    /// Executing pipeline steps
    Running,
    /// All steps completed
    Succeeded,
    /// A step failed
    Failed,
    /// Cancelled by the user
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One end-to-end media conversion request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source media file
    pub source: PathBuf,

    /// Processing configuration
    pub config: JobConfig,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Step currently executing (or last executed)
    #[serde(default)]
    pub current_step: Step,

    /// Overall progress in [0, 1]
    #[serde(default)]
    pub progress: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Finished at timestamp, set exactly when the status is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Kept output files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_files: Option<OutputFiles>,

    /// Source file size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(source: impl Into<PathBuf>, config: JobConfig) -> Self {
        Self {
            id: JobId::new(),
            source: source.into(),
            config,
            status: JobStatus::Pending,
            current_step: Step::Idle,
            progress: 0.0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            output_files: None,
            file_size: None,
        }
    }

    /// Attach the source file size.
    pub fn with_file_size(mut self, size: Option<u64>) -> Self {
        self.file_size = size;
        self
    }

    /// Mark the job as running.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.current_step = Step::Idle;
        self.progress = 0.0;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.error = None;
    }

    /// Record step and progress while running.
    pub fn report_progress(&mut self, step: Step, progress: f64) {
        self.current_step = step;
        self.progress = progress.clamp(0.0, 1.0);
    }

    /// Mark the job as succeeded with its outputs.
    pub fn succeed(&mut self, outputs: OutputFiles) {
        self.status = JobStatus::Succeeded;
        self.current_step = Step::Completed;
        self.progress = 1.0;
        self.output_files = Some(outputs);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the job as failed.
    pub fn fail(&mut self, error: impl Into<String>, outputs: OutputFiles) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.output_files = Some(outputs);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the job as cancelled. Cancellation carries no error message.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// A fresh pending job for the same source and configuration.
    pub fn retry(&self) -> Self {
        Self::new(self.source.clone(), self.config.clone()).with_file_size(self.file_size)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_start(&self) -> bool {
        self.status == JobStatus::Pending
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }

    pub fn can_retry(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Source file name.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Source file name without extension.
    pub fn file_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Directory containing the source file.
    pub fn source_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Steps required by this job's mode.
    pub fn steps(&self) -> &'static [Step] {
        self.config.mode.steps()
    }

    /// 0-based index of the current step within the mode.
    pub fn current_step_index(&self) -> Option<usize> {
        self.steps().iter().position(|s| *s == self.current_step)
    }

    pub fn total_steps(&self) -> usize {
        self.steps().len()
    }

    /// Time spent running, up to now for a running job.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let started = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Utc::now);
        Some(end - started)
    }
}
