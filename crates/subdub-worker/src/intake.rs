//! Build jobs from user-selected files and folders.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use subdub_models::{Job, JobConfig};

/// Video container extensions accepted as job sources.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "m4v", "flv", "wmv"];

/// Whether `path` has a supported video extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// One pending job per path, sharing `config`.
pub fn jobs_from_paths<I, P>(paths: I, config: &JobConfig) -> Vec<Job>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths
        .into_iter()
        .map(|p| {
            let path = p.into();
            let size = std::fs::metadata(&path).ok().map(|m| m.len());
            Job::new(path, config.clone()).with_file_size(size)
        })
        .collect()
}

/// Collect video files under `dir`, recursively, sorted by file name.
///
/// Hidden files and directories below `dir` are skipped, which also keeps
/// job working directories out of the result.
pub fn find_videos(dir: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(DirEntry::into_path)
        .collect();

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(dir = %dir.display(), count = videos.len(), "Scanned folder for videos");
    videos
}

/// One pending job per video file found under `dir`.
pub fn jobs_from_folder(dir: &Path, config: &JobConfig) -> Vec<Job> {
    jobs_from_paths(find_videos(dir), config)
}
