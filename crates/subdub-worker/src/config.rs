//! Worker configuration.

use std::time::Duration;

/// Default number of jobs processed at once.
pub const DEFAULT_MAX_JOBS: usize = 3;

/// Default name of the per-source working root.
pub const DEFAULT_WORK_DIR_NAME: &str = ".subdub";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Directory created next to each source file to hold job working dirs
    pub work_dir_name: String,
    /// Per-invocation FFmpeg timeout
    pub ffmpeg_timeout: Duration,
    /// Capacity of the progress event channel
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_JOBS,
            work_dir_name: DEFAULT_WORK_DIR_NAME.to_string(),
            ffmpeg_timeout: Duration::from_secs(1800), // 30 minutes
            event_capacity: 256,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("SUBDUB_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_JOBS),
            work_dir_name: std::env::var("SUBDUB_WORK_DIR_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WORK_DIR_NAME.to_string()),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("SUBDUB_FFMPEG_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            event_capacity: std::env::var("SUBDUB_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(256),
        }
    }

    /// Set the maximum number of concurrent jobs.
    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n;
        self
    }
}
