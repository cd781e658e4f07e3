//! Reassembly of synthesized speech clips into one continuous track.
//!
//! Clips are ordered by start time and separated by rendered silences so each
//! clip begins where its source segment began. Silences shorter than
//! [`MIN_GAP_SECS`] are dropped because FFmpeg cannot reliably render them.

use std::path::{Path, PathBuf};
use subdub_models::SpeechClip;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::toolkit::MediaToolkit;

/// Shortest silence inserted between clips, in seconds.
pub const MIN_GAP_SECS: f64 = 0.05;

/// Concat demuxer list written next to the silences.
pub const CONCAT_LIST_FILE: &str = "concat_list.txt";

/// Where a silence goes in the start-ordered clip sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPosition {
    /// Before the first clip
    Leading,
    /// After the clip at this position in start order
    After(usize),
}

/// A silence to splice into the clip sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub position: GapPosition,
    pub duration: f64,
}

/// Silence schedule for `clips`.
///
/// Clips are considered in start-time order; `GapPosition::After(i)` refers
/// to that order. No trailing gap is produced.
pub fn compute_gaps(clips: &[SpeechClip]) -> Vec<Gap> {
    let sorted = sorted_by_start(clips);
    let mut gaps = Vec::new();

    let Some(first) = sorted.first() else {
        return gaps;
    };

    if first.start > MIN_GAP_SECS {
        gaps.push(Gap {
            position: GapPosition::Leading,
            duration: first.start,
        });
    }

    for (i, pair) in sorted.windows(2).enumerate() {
        let duration = pair[1].start - pair[0].end;
        if duration >= MIN_GAP_SECS {
            gaps.push(Gap {
                position: GapPosition::After(i),
                duration,
            });
        }
    }

    gaps
}

fn sorted_by_start(clips: &[SpeechClip]) -> Vec<&SpeechClip> {
    let mut sorted: Vec<&SpeechClip> = clips.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
    sorted
}

/// One entry of the concatenation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEntry {
    /// Clip at this position in start order
    Clip(usize),
    /// Gap at this position in the gap list
    Silence(usize),
}

/// Interleave `clip_count` clips with `gaps` in playback order.
pub fn build_plan(clip_count: usize, gaps: &[Gap]) -> Vec<PlanEntry> {
    let mut plan = Vec::with_capacity(clip_count + gaps.len());

    let silence_at = |position: GapPosition| gaps.iter().position(|g| g.position == position);

    if let Some(g) = silence_at(GapPosition::Leading) {
        plan.push(PlanEntry::Silence(g));
    }
    for i in 0..clip_count {
        plan.push(PlanEntry::Clip(i));
        if let Some(g) = silence_at(GapPosition::After(i)) {
            plan.push(PlanEntry::Silence(g));
        }
    }

    plan
}

/// Render an FFmpeg concat demuxer list.
pub fn render_concat_list<P: AsRef<Path>>(files: &[P]) -> String {
    files
        .iter()
        .map(|f| {
            let path = f.as_ref().to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", path)
        })
        .collect()
}

/// What an assembly run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblySummary {
    pub output: PathBuf,
    pub clip_count: usize,
    pub silence_count: usize,
    pub total_silence: f64,
}

/// Assemble synthesized clips into a single track at `output`.
///
/// Silences and the concat list are written under `work_dir`. Fails if any
/// clip has no audio file on disk.
pub async fn assemble_speech_track(
    toolkit: &dyn MediaToolkit,
    clips: &[SpeechClip],
    work_dir: &Path,
    output: &Path,
    cancel: &CancellationToken,
) -> MediaResult<AssemblySummary> {
    if clips.is_empty() {
        return Err(MediaError::internal("no speech clips to assemble"));
    }

    let sorted = sorted_by_start(clips);
    let mut clip_files = Vec::with_capacity(sorted.len());
    for clip in &sorted {
        let audio = clip
            .audio
            .as_ref()
            .ok_or_else(|| MediaError::missing_clip_audio(clip.index, "no audio produced"))?;
        if !audio.exists() {
            return Err(MediaError::missing_clip_audio(
                clip.index,
                format!("{} does not exist", audio.display()),
            ));
        }
        clip_files.push(audio.clone());
    }

    tokio::fs::create_dir_all(work_dir).await?;

    let gaps = compute_gaps(clips);
    let mut silence_files = Vec::with_capacity(gaps.len());
    for (i, gap) in gaps.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        let path = work_dir.join(format!("silence_{:03}.mp3", i + 1));
        debug!(duration = gap.duration, "Rendering silence {}", path.display());
        toolkit.generate_silence(gap.duration, &path, cancel).await?;
        silence_files.push(path);
    }

    let files: Vec<&Path> = build_plan(clip_files.len(), &gaps)
        .into_iter()
        .map(|entry| match entry {
            PlanEntry::Clip(i) => clip_files[i].as_path(),
            PlanEntry::Silence(g) => silence_files[g].as_path(),
        })
        .collect();

    let list_file = work_dir.join(CONCAT_LIST_FILE);
    tokio::fs::write(&list_file, render_concat_list(&files)).await?;

    if cancel.is_cancelled() {
        return Err(MediaError::Cancelled);
    }
    toolkit.concat(&list_file, output, cancel).await?;

    let summary = AssemblySummary {
        output: output.to_path_buf(),
        clip_count: clip_files.len(),
        silence_count: gaps.len(),
        total_silence: gaps.iter().map(|g| g.duration).sum(),
    };
    info!(
        clips = summary.clip_count,
        silences = summary.silence_count,
        total_silence = summary.total_silence,
        "Assembled speech track {}",
        output.display()
    );
    Ok(summary)
}
