//! Intermediate artifacts threaded between pipeline steps.

use std::fmt;
use std::path::PathBuf;
use subdub_models::{BilingualSegment, Segment, SpeechClip, Step};

/// Output of the steps run so far.
///
/// Each step consumes exactly one variant and produces the next, so the
/// artifacts a step needs are always present when it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Nothing produced yet
    Start,
    /// Audio extracted from the source
    Extracted { audio: PathBuf },
    /// Transcript split into segments
    Segmented { segments: Vec<Segment> },
    /// Segments with target-language text
    Translated { bilingual: Vec<BilingualSegment> },
    /// One speech clip per bilingual segment
    Synthesized { clips: Vec<SpeechClip> },
    /// Clips assembled into one track
    Assembled { audio: PathBuf },
    /// Dubbed video written
    Composed { video: PathBuf },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Extracted { .. } => "extracted",
            Stage::Segmented { .. } => "segmented",
            Stage::Translated { .. } => "translated",
            Stage::Synthesized { .. } => "synthesized",
            Stage::Assembled { .. } => "assembled",
            Stage::Composed { .. } => "composed",
        }
    }

    /// Whether `step` can consume this stage.
    pub fn accepts(&self, step: Step) -> bool {
        matches!(
            (step, self),
            (Step::ExtractAudio, Stage::Start)
                | (Step::Transcribe, Stage::Extracted { .. })
                | (Step::Translate, Stage::Segmented { .. })
                | (Step::GenerateSubtitles, Stage::Segmented { .. })
                | (Step::GenerateSubtitles, Stage::Translated { .. })
                | (Step::GenerateSpeech, Stage::Translated { .. })
                | (Step::AssembleAudio, Stage::Synthesized { .. })
                | (Step::ComposeVideo, Stage::Assembled { .. })
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
