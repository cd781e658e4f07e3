//! Checks that the host can run dubbing jobs.

use std::path::Path;

use anyhow::{anyhow, Context};
use tracing::info;

use subdub_media::{check_ffmpeg, check_ffprobe};
use subdub_worker::logging::init_tracing;
use subdub_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    info!(
        max_jobs = config.max_concurrent_jobs,
        work_dir_name = %config.work_dir_name,
        "subdub-selfcheck: starting"
    );

    let ffmpeg = check_ffmpeg().context("ffmpeg is required for audio extraction and muxing")?;
    info!("ffmpeg: {}", ffmpeg.display());
    let ffprobe = check_ffprobe().context("ffprobe is required for duration probing")?;
    info!("ffprobe: {}", ffprobe.display());

    ensure_work_dir_name(&config.work_dir_name)?;
    ensure_workdir_writable(&config.work_dir_name).await?;

    println!("subdub-selfcheck: ok");
    Ok(())
}

/// The working root is created next to each source, so it must be a single
/// path component.
fn ensure_work_dir_name(name: &str) -> anyhow::Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) => Ok(()),
        _ => Err(anyhow!("invalid SUBDUB_WORK_DIR_NAME '{}'", name)),
    }
}

async fn ensure_workdir_writable(name: &str) -> anyhow::Result<()> {
    let base = std::env::temp_dir().join(name).join("selfcheck");
    tokio::fs::create_dir_all(&base)
        .await
        .with_context(|| format!("cannot create {}", base.display()))?;
    tokio::fs::remove_dir_all(&base).await?;
    Ok(())
}
