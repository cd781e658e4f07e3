//! Per-job processing configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::PipelineMode;

/// Subtitle file format to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
    Ass,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Ass => "ass",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "SRT (SubRip)",
            SubtitleFormat::Vtt => "VTT (WebVTT)",
            SubtitleFormat::Ass => "ASS (SubStation Alpha)",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Source and target languages must be different")]
    SameSourceAndTarget,

    #[error("Language code must not be empty")]
    EmptyLanguage,

    #[error("Fixed segment duration must be positive, got {0}")]
    InvalidSegmentDuration(String),
}

/// Immutable-per-run configuration for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobConfig {
    /// Processing mode
    #[serde(default)]
    pub mode: PipelineMode,

    /// Source language code (e.g. "en")
    pub source_language: String,

    /// Target language code (e.g. "ru")
    pub target_language: String,

    /// Speech recognizer model selector, opaque to the engine
    pub recognizer_model: String,

    /// Speech synthesizer voice selector, opaque to the engine
    pub voice: String,

    /// Stretch synthesized clips to their source timing window
    #[serde(default = "default_true")]
    pub speed_sync: bool,

    /// Use fixed-duration segmentation instead of dynamic breaks
    #[serde(default)]
    pub fixed_segments: bool,

    /// Segment length in seconds for fixed-duration segmentation
    #[serde(default = "default_fixed_segment_duration")]
    pub fixed_segment_duration: f64,

    /// Output directory (None = next to the source file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Remove the job's working directory after the run
    #[serde(default = "default_true")]
    pub cleanup: bool,

    /// Subtitle format to export
    #[serde(default)]
    pub subtitle_format: SubtitleFormat,
}

fn default_true() -> bool {
    true
}

fn default_fixed_segment_duration() -> f64 {
    7.0
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::FullPipeline,
            source_language: "en".to_string(),
            target_language: "ru".to_string(),
            recognizer_model: "base".to_string(),
            voice: "ru-RU-DmitryNeural".to_string(),
            speed_sync: true,
            fixed_segments: false,
            fixed_segment_duration: default_fixed_segment_duration(),
            output_dir: None,
            cleanup: true,
            subtitle_format: SubtitleFormat::Srt,
        }
    }
}

impl JobConfig {
    /// Set the pipeline mode.
    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set source and target languages.
    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_language = source.into();
        self.target_language = target.into();
        self
    }

    /// Use fixed-duration segmentation.
    pub fn with_fixed_segments(mut self, duration: f64) -> Self {
        self.fixed_segments = true;
        self.fixed_segment_duration = duration;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }

        if self.mode.requires_translation() {
            if self.target_language.trim().is_empty() {
                return Err(ConfigError::EmptyLanguage);
            }
            if self.source_language == self.target_language {
                return Err(ConfigError::SameSourceAndTarget);
            }
        }

        if self.fixed_segments
            && !(self.fixed_segment_duration.is_finite() && self.fixed_segment_duration > 0.0)
        {
            return Err(ConfigError::InvalidSegmentDuration(
                self.fixed_segment_duration.to_string(),
            ));
        }

        Ok(())
    }
}
