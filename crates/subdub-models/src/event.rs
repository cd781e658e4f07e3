//! Progress events published by the scheduler and pipeline executors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus, Step};

/// A discrete progress/status event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A job started executing a new step
    StepChanged {
        job_id: JobId,
        step: Step,
        /// Overall job progress in [0, 1]
        overall: f64,
    },

    /// Progress inside the current step
    Progress {
        job_id: JobId,
        step: Step,
        /// Progress within the step in [0, 1]
        step_progress: f64,
        /// Overall job progress in [0, 1]
        overall: f64,
    },

    /// A job reached a terminal state
    Finished {
        job_id: JobId,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The scheduler's queue changed
    QueueChanged { running: usize, pending: usize },

    /// The scheduler has no queued or running work left
    Idle,
}

impl ProgressEvent {
    pub fn step_changed(job_id: &JobId, step: Step, overall: f64) -> Self {
        Self::StepChanged {
            job_id: job_id.clone(),
            step,
            overall: overall.clamp(0.0, 1.0),
        }
    }

    pub fn progress(job_id: &JobId, step: Step, step_progress: f64, overall: f64) -> Self {
        Self::Progress {
            job_id: job_id.clone(),
            step,
            step_progress: step_progress.clamp(0.0, 1.0),
            overall: overall.clamp(0.0, 1.0),
        }
    }

    pub fn finished(job_id: &JobId, status: JobStatus, error: Option<String>) -> Self {
        Self::Finished {
            job_id: job_id.clone(),
            status,
            error,
        }
    }

    /// Job this event refers to, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::StepChanged { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Finished { job_id, .. } => Some(job_id),
            Self::QueueChanged { .. } | Self::Idle => None,
        }
    }
}
