//! Pipeline modes and the steps they run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of the processing pipeline.
///
/// The declaration order is the execution order; modes run an ordered subset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Idle,
    ExtractAudio,
    Transcribe,
    Translate,
    GenerateSubtitles,
    GenerateSpeech,
    AssembleAudio,
    ComposeVideo,
    Completed,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Idle => "idle",
            Step::ExtractAudio => "extract_audio",
            Step::Transcribe => "transcribe",
            Step::Translate => "translate",
            Step::GenerateSubtitles => "generate_subtitles",
            Step::GenerateSpeech => "generate_speech",
            Step::AssembleAudio => "assemble_audio",
            Step::ComposeVideo => "compose_video",
            Step::Completed => "completed",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Step::Idle => "Idle",
            Step::ExtractAudio => "Extracting Audio",
            Step::Transcribe => "Transcribing",
            Step::Translate => "Translating",
            Step::GenerateSubtitles => "Generating Subtitles",
            Step::GenerateSpeech => "Generating Speech",
            Step::AssembleAudio => "Assembling Audio",
            Step::ComposeVideo => "Composing Video",
            Step::Completed => "Completed",
        }
    }

    /// Relative weight used to interpolate progress inside a step.
    ///
    /// Weights are not normalized per mode.
    pub fn weight(&self) -> f64 {
        match self {
            Step::Idle => 0.0,
            Step::ExtractAudio => 0.10,
            Step::Transcribe => 0.25,
            Step::Translate => 0.15,
            Step::GenerateSubtitles => 0.10,
            Step::GenerateSpeech => 0.20,
            Step::AssembleAudio => 0.10,
            Step::ComposeVideo => 0.10,
            Step::Completed => 1.0,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing mode, selecting which steps a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Subtitles in the source language only
    SubtitlesOnly,
    /// Subtitles in the source and target languages
    #[serde(rename = "subtitles_translation")]
    SubtitlesWithTranslation,
    /// Video with translated speech, no subtitle files
    DubbedVideoOnly,
    /// Subtitles and dubbed video
    #[default]
    FullPipeline,
}

impl PipelineMode {
    pub const ALL: [PipelineMode; 4] = [
        PipelineMode::SubtitlesOnly,
        PipelineMode::SubtitlesWithTranslation,
        PipelineMode::DubbedVideoOnly,
        PipelineMode::FullPipeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::SubtitlesOnly => "subtitles_only",
            PipelineMode::SubtitlesWithTranslation => "subtitles_translation",
            PipelineMode::DubbedVideoOnly => "dubbed_video_only",
            PipelineMode::FullPipeline => "full_pipeline",
        }
    }

    /// Ordered steps executed for this mode.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            PipelineMode::SubtitlesOnly => {
                &[Step::ExtractAudio, Step::Transcribe, Step::GenerateSubtitles]
            }
            PipelineMode::SubtitlesWithTranslation => &[
                Step::ExtractAudio,
                Step::Transcribe,
                Step::Translate,
                Step::GenerateSubtitles,
            ],
            PipelineMode::DubbedVideoOnly => &[
                Step::ExtractAudio,
                Step::Transcribe,
                Step::Translate,
                Step::GenerateSpeech,
                Step::AssembleAudio,
                Step::ComposeVideo,
            ],
            PipelineMode::FullPipeline => &[
                Step::ExtractAudio,
                Step::Transcribe,
                Step::Translate,
                Step::GenerateSubtitles,
                Step::GenerateSpeech,
                Step::AssembleAudio,
                Step::ComposeVideo,
            ],
        }
    }

    pub fn requires_translation(&self) -> bool {
        *self != PipelineMode::SubtitlesOnly
    }

    pub fn generates_subtitles(&self) -> bool {
        *self != PipelineMode::DubbedVideoOnly
    }

    pub fn generates_video(&self) -> bool {
        matches!(self, PipelineMode::DubbedVideoOnly | PipelineMode::FullPipeline)
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
