//! Job-scoped working directory and output paths.

use std::path::{Path, PathBuf};
use subdub_media::fs_utils::remove_work_dir;
use subdub_models::Job;

use crate::error::WorkerResult;

/// Paths used by one job run.
///
/// Transient files live under `<source dir>/<work dir name>/<job id>/`;
/// kept outputs go to the configured output directory or next to the source.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
    output_dir: PathBuf,
    stem: String,
    source_language: String,
    target_language: String,
    subtitle_ext: &'static str,
}

impl JobWorkspace {
    pub fn new(job: &Job, work_dir_name: &str) -> Self {
        let root = job
            .source_dir()
            .join(work_dir_name)
            .join(job.id.as_str());
        let output_dir = job
            .config
            .output_dir
            .clone()
            .unwrap_or_else(|| job.source_dir().to_path_buf());

        Self {
            root,
            output_dir,
            stem: job.file_stem(),
            source_language: job.config.source_language.clone(),
            target_language: job.config.target_language.clone(),
            subtitle_ext: job.config.subtitle_format.extension(),
        }
    }

    /// Create the working directory and the output directory.
    pub async fn create(&self) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Remove the working directory, and its parent when left empty.
    pub async fn cleanup(&self) -> WorkerResult<()> {
        remove_work_dir(&self.root, true).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extracted_audio(&self) -> PathBuf {
        self.root.join("audio.mp3")
    }

    pub fn tts_dir(&self) -> PathBuf {
        self.root.join("tts")
    }

    pub fn assembly_dir(&self) -> PathBuf {
        self.root.join("assembly")
    }

    pub fn dubbed_audio(&self) -> PathBuf {
        self.root.join("dubbed_audio.mp3")
    }

    pub fn original_subtitles(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.stem, self.source_language, self.subtitle_ext
        ))
    }

    pub fn translated_subtitles(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.stem, self.target_language, self.subtitle_ext
        ))
    }

    pub fn dubbed_video(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.mp4", self.stem, self.target_language))
    }
}
