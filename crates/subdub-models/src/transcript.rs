//! Transcript, segment and synthesized-clip timing types.
//!
//! All times are in seconds from the start of the source media.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A recognized word with its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Speech recognizer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Full transcription text
    pub text: String,
    /// Words with timestamps, in source order
    pub words: Vec<Word>,
    /// Detected or requested language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Total audio duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Transcript {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Text of the words fully contained in `[start, end]`.
    pub fn text_between(&self, start: f64, end: f64) -> String {
        self.words
            .iter()
            .filter(|w| w.start >= start && w.end <= end)
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A contiguous run of words grouped for subtitles and translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub text: String,
    pub words: Vec<Word>,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Build a segment spanning `words`. Returns `None` for an empty run.
    pub fn from_words(words: Vec<Word>) -> Option<Self> {
        let start = words.first()?.start;
        let end = words.last()?.end;
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Self {
            text,
            words,
            start,
            end,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// A segment carrying both source and target-language text.
///
/// Timing is inherited from the source segment unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BilingualSegment {
    pub original: String,
    pub translated: String,
    pub start: f64,
    pub end: f64,
}

impl BilingualSegment {
    pub fn new(segment: &Segment, translated: impl Into<String>) -> Self {
        Self {
            original: segment.text.clone(),
            translated: translated.into(),
            start: segment.start,
            end: segment.end,
        }
    }

    /// A bilingual segment with the original text in both slots.
    pub fn untranslated(segment: &Segment) -> Self {
        Self::new(segment, segment.text.clone())
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A synthesized speech clip for one bilingual segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeechClip {
    /// 1-based position in the segment list
    pub index: usize,
    /// Target-language text
    pub text: String,
    /// Start of the target timing window
    pub start: f64,
    /// End of the target timing window
    pub end: f64,
    /// Produced audio file, set after synthesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
}

impl SpeechClip {
    pub fn new(index: usize, segment: &BilingualSegment) -> Self {
        Self {
            index,
            text: segment.translated.clone(),
            start: segment.start,
            end: segment.end,
            audio: None,
        }
    }

    /// Target duration of the clip.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// File name of the clip's final audio.
    pub fn file_name(&self) -> String {
        format!("segment_{:03}.mp3", self.index)
    }
}
