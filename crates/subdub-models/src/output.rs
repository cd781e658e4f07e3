//! Output files kept after a job finishes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artifacts a job intends to keep.
///
/// Transient artifacts (extracted audio, per-clip speech) live under the job's
/// working directory and are never recorded here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutputFiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_subtitles: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_subtitles: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dubbed_video: Option<PathBuf>,
}

impl OutputFiles {
    pub fn has_any_output(&self) -> bool {
        self.count() > 0
    }

    pub fn count(&self) -> usize {
        [
            &self.original_subtitles,
            &self.translated_subtitles,
            &self.dubbed_video,
        ]
        .iter()
        .filter(|p| p.is_some())
        .count()
    }
}
