#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the dubbing pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with cancellation and timeout support
//! - Duration probing via FFprobe
//! - The [`MediaToolkit`] seam the pipeline talks to, with an FFmpeg implementation
//! - Gap reconstruction and assembly of synthesized speech clips
//! - Tempo correction with chained `atempo` stages

pub mod assembly;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod tempo;
pub mod toolkit;

pub use assembly::{
    assemble_speech_track, compute_gaps, AssemblySummary, Gap, GapPosition, MIN_GAP_SECS,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use tempo::{TempoChain, TempoCorrector, TempoOutcome};
pub use toolkit::{FfmpegToolkit, MediaToolkit, MuxRequest};
