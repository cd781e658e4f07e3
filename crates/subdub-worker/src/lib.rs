//! Dubbing job worker.
//!
//! This crate provides:
//! - Job scheduler with a bounded number of concurrent jobs
//! - Pipeline executor running each job's steps
//! - Transcript segmentation
//! - Traits for the recognition, translation, synthesis and subtitle engines
//! - Job intake from files and folders
//! - Progress emission and cancellation

pub mod collaborators;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod segmenter;

pub use collaborators::{
    CollaboratorResult, Collaborators, SpeechRecognizer, SpeechSynthesizer, SubtitleWriter,
    Translator,
};
pub use config::WorkerConfig;
pub use error::{CollaboratorError, WorkerError, WorkerResult};
pub use intake::{jobs_from_folder, jobs_from_paths};
pub use logging::JobLogger;
pub use pipeline::{EventSink, JobFailure, PipelineExecutor, Stage};
pub use scheduler::{JobRunner, JobScheduler, QueueStats};
pub use segmenter::{SegmentPolicy, Segmenter, SegmenterConfig};
