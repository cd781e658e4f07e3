//! Shared data models for the SubDub processing engine.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and output files
//! - Per-job configuration and pipeline modes
//! - Pipeline steps and their progress weights
//! - Transcript, segment and synthesized-clip timing data
//! - Progress events published by the scheduler and executors

pub mod config;
pub mod event;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod transcript;

// Re-export common types
pub use config::{ConfigError, JobConfig, SubtitleFormat};
pub use event::ProgressEvent;
pub use job::{Job, JobId, JobStatus};
pub use output::OutputFiles;
pub use pipeline::{PipelineMode, Step};
pub use transcript::{BilingualSegment, Segment, SpeechClip, Transcript, Word};
