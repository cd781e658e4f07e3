//! Worker error types.

use subdub_models::Step;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Job-scoped failures. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Segmentation produced no segments from {0} words")]
    SegmentationEmpty(usize),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Subtitle generation failed: {0}")]
    SubtitleGenerationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Audio assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Video composition failed: {0}")]
    CompositionFailed(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] subdub_models::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Scheduler is no longer running")]
    SchedulerClosed,

    #[error("Media error: {0}")]
    Media(#[from] subdub_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn transcription_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptionFailed(msg.into())
    }

    pub fn translation_failed(msg: impl Into<String>) -> Self {
        Self::TranslationFailed(msg.into())
    }

    pub fn subtitle_generation_failed(msg: impl Into<String>) -> Self {
        Self::SubtitleGenerationFailed(msg.into())
    }

    pub fn synthesis_failed(msg: impl Into<String>) -> Self {
        Self::SynthesisFailed(msg.into())
    }

    pub fn assembly_failed(msg: impl Into<String>) -> Self {
        Self::AssemblyFailed(msg.into())
    }

    pub fn composition_failed(msg: impl Into<String>) -> Self {
        Self::CompositionFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap a media failure raised while running `step`.
    ///
    /// A cancelled media call stays [`WorkerError::Cancelled`].
    pub fn from_media(step: Step, err: subdub_media::MediaError) -> Self {
        if err.is_cancelled() {
            return Self::Cancelled;
        }
        let msg = match err.diagnostics() {
            Some(diag) if !diag.is_empty() => format!("{err}\n{diag}"),
            _ => err.to_string(),
        };
        match step {
            Step::ExtractAudio => Self::ExtractionFailed(msg),
            Step::Transcribe => Self::TranscriptionFailed(msg),
            Step::Translate => Self::TranslationFailed(msg),
            Step::GenerateSubtitles => Self::SubtitleGenerationFailed(msg),
            Step::GenerateSpeech => Self::SynthesisFailed(msg),
            Step::AssembleAudio => Self::AssemblyFailed(msg),
            Step::ComposeVideo => Self::CompositionFailed(msg),
            Step::Idle | Step::Completed => Self::Media(err),
        }
    }

    /// Wrap a collaborator failure raised while running `step`.
    pub fn from_collaborator(step: Step, err: CollaboratorError) -> Self {
        let msg = match err {
            CollaboratorError::Cancelled => return Self::Cancelled,
            CollaboratorError::Failed(msg) => msg,
        };
        match step {
            Step::ExtractAudio => Self::ExtractionFailed(msg),
            Step::Transcribe => Self::TranscriptionFailed(msg),
            Step::Translate => Self::TranslationFailed(msg),
            Step::GenerateSubtitles => Self::SubtitleGenerationFailed(msg),
            Step::GenerateSpeech => Self::SynthesisFailed(msg),
            Step::AssembleAudio => Self::AssemblyFailed(msg),
            Step::ComposeVideo => Self::CompositionFailed(msg),
            Step::Idle | Step::Completed => Self::Internal(msg),
        }
    }

    /// Check if the job was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Step the failure belongs to, if it is step-specific.
    pub fn step(&self) -> Option<Step> {
        match self {
            WorkerError::ExtractionFailed(_) => Some(Step::ExtractAudio),
            WorkerError::TranscriptionFailed(_) | WorkerError::SegmentationEmpty(_) => {
                Some(Step::Transcribe)
            }
            WorkerError::TranslationFailed(_) => Some(Step::Translate),
            WorkerError::SubtitleGenerationFailed(_) => Some(Step::GenerateSubtitles),
            WorkerError::SynthesisFailed(_) => Some(Step::GenerateSpeech),
            WorkerError::AssemblyFailed(_) => Some(Step::AssembleAudio),
            WorkerError::CompositionFailed(_) => Some(Step::ComposeVideo),
            _ => None,
        }
    }
}

/// Failure reported by an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl CollaboratorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
