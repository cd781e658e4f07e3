//! External engines the pipeline drives.
//!
//! Recognition, translation, synthesis and subtitle serialization are not
//! implemented in this crate. Each takes the job's cancellation token; an
//! in-flight call may still run to completion after cancellation.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use subdub_media::{FfmpegToolkit, MediaToolkit};
use subdub_models::{BilingualSegment, SubtitleFormat, Transcript};

use crate::error::CollaboratorError;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Speech-to-text engine.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Load `model`. Repeated calls after success must be no-ops.
    async fn initialize(&self, model: &str, cancel: &CancellationToken)
        -> CollaboratorResult<()>;

    /// Transcribe `audio` with word timestamps.
    async fn transcribe(
        &self,
        audio: &Path,
        language: &str,
        cancel: &CancellationToken,
    ) -> CollaboratorResult<Transcript>;
}

/// Text translation engine, called once per segment.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        cancel: &CancellationToken,
    ) -> CollaboratorResult<String>;
}

/// Text-to-speech engine, called once per bilingual segment.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        output: &Path,
        cancel: &CancellationToken,
    ) -> CollaboratorResult<()>;
}

/// Subtitle file serializer.
#[async_trait]
pub trait SubtitleWriter: Send + Sync {
    /// Write the original track to `original` and, when given, the
    /// translated track to `translated`.
    async fn write(
        &self,
        format: SubtitleFormat,
        segments: &[BilingualSegment],
        original: &Path,
        translated: Option<&Path>,
        cancel: &CancellationToken,
    ) -> CollaboratorResult<()>;
}

/// The set of engines one executor uses.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaToolkit>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub subtitles: Arc<dyn SubtitleWriter>,
}

impl Collaborators {
    /// Use the FFmpeg toolkit for media operations.
    pub fn with_ffmpeg(
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        subtitles: Arc<dyn SubtitleWriter>,
        ffmpeg: FfmpegToolkit,
    ) -> Self {
        Self {
            media: Arc::new(ffmpeg),
            recognizer,
            translator,
            synthesizer,
            subtitles,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
