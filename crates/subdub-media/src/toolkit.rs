//! The media capability the pipeline depends on, and its FFmpeg implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::tempo::TempoChain;

/// Inputs for composing the dubbed video.
#[derive(Debug, Clone)]
pub struct MuxRequest {
    /// Source video; only its first video stream is kept
    pub video: PathBuf,
    /// Replacement audio track
    pub audio: PathBuf,
    /// Optional subtitle track
    pub subtitles: Option<PathBuf>,
    /// Output container path
    pub output: PathBuf,
    /// Language tag for the new audio and subtitle streams
    pub language: String,
}

/// Audio/video prober and transcoder.
///
/// Every operation reports pass/fail with diagnostics carried in the error.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Extract the audio track of `source` to an MP3 at `output`.
    async fn extract_audio(
        &self,
        source: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()>;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Apply a tempo chain to `input`, writing `output`.
    async fn transform_tempo(
        &self,
        input: &Path,
        chain: &TempoChain,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()>;

    /// Render `duration` seconds of silence.
    async fn generate_silence(
        &self,
        duration: f64,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()>;

    /// Concatenate the files named in a concat demuxer list.
    async fn concat(
        &self,
        list_file: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()>;

    /// Mux video, replacement audio and optional subtitles.
    async fn mux(&self, request: &MuxRequest, cancel: &CancellationToken) -> MediaResult<()>;

    /// Copy a file unchanged.
    async fn copy(&self, input: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

/// [`MediaToolkit`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    timeout: Option<Duration>,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single FFmpeg invocation running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn runner(&self, cancel: &CancellationToken) -> FfmpegRunner {
        FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(self.timeout)
    }

    fn ensure_input(path: &Path) -> MediaResult<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }
    }
}

/// Build the audio extraction command.
pub fn extract_audio_command(source: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(source, output)
        .no_video()
        .audio_format(44100, 2)
        .audio_bitrate("192k")
        .output_args(["-f", "mp3"])
}

/// Build the silence rendering command.
pub fn silence_command(duration: f64, output: &Path) -> FfmpegCommand {
    FfmpegCommand::lavfi("anullsrc=r=48000:cl=stereo", output)
        .output_arg("-t")
        .output_arg(format!("{:.3}", duration))
        .audio_codec("libmp3lame")
        .audio_bitrate("128k")
}

/// Build the tempo transform command.
pub fn tempo_command(input: &Path, chain: &TempoChain, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .audio_filter(chain.to_filter())
        .audio_codec("libmp3lame")
        .audio_bitrate("128k")
}

/// Build the concat demuxer command.
pub fn concat_command(list_file: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(list_file, output)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .audio_codec("libmp3lame")
        .audio_bitrate("192k")
}

/// Build the mux command.
pub fn mux_command(request: &MuxRequest) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(&request.video, &request.output).add_input(&request.audio);
    if let Some(subtitles) = &request.subtitles {
        cmd = cmd.add_input(subtitles);
    }

    cmd = cmd.map("0:v:0").map("1:a:0");
    if request.subtitles.is_some() {
        cmd = cmd.map("2:s:0");
    }

    cmd = cmd.video_codec("copy").audio_codec("aac").audio_bitrate("192k");
    if request.subtitles.is_some() {
        cmd = cmd.subtitle_codec("mov_text");
    }

    cmd = cmd.stream_metadata("s:a:0", "language", &request.language);
    if request.subtitles.is_some() {
        cmd = cmd.stream_metadata("s:s:0", "language", &request.language);
    }
    cmd
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn extract_audio(
        &self,
        source: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        Self::ensure_input(source)?;
        debug!("Extracting audio: {} -> {}", source.display(), output.display());
        self.runner(cancel)
            .run(&extract_audio_command(source, output))
            .await
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        crate::probe::probe_duration(path).await
    }

    async fn transform_tempo(
        &self,
        input: &Path,
        chain: &TempoChain,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        Self::ensure_input(input)?;
        self.runner(cancel)
            .run(&tempo_command(input, chain, output))
            .await
    }

    async fn generate_silence(
        &self,
        duration: f64,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        self.runner(cancel)
            .run(&silence_command(duration, output))
            .await
    }

    async fn concat(
        &self,
        list_file: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        Self::ensure_input(list_file)?;
        self.runner(cancel)
            .run(&concat_command(list_file, output))
            .await
    }

    async fn mux(&self, request: &MuxRequest, cancel: &CancellationToken) -> MediaResult<()> {
        Self::ensure_input(&request.video)?;
        Self::ensure_input(&request.audio)?;
        self.runner(cancel).run(&mux_command(request)).await?;

        if !request.output.exists() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg succeeded but the output file is missing",
                None,
                None,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pair(args: &[String], a: &str, b: &str) -> bool {
        args.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    #[test]
    fn test_extract_audio_command() {
        let args = extract_audio_command(Path::new("in.mp4"), Path::new("audio.mp3")).build_args();
        assert!(args.contains(&"-vn".to_string()));
        assert!(has_pair(&args, "-ar", "44100"));
        assert!(has_pair(&args, "-ac", "2"));
        assert!(has_pair(&args, "-b:a", "192k"));
        assert!(has_pair(&args, "-f", "mp3"));
    }

    #[test]
    fn test_silence_command() {
        let args = silence_command(0.5, Path::new("silence_001.mp3")).build_args();
        assert!(has_pair(&args, "-f", "lavfi"));
        assert!(has_pair(&args, "-i", "anullsrc=r=48000:cl=stereo"));
        assert!(has_pair(&args, "-t", "0.500"));
        assert!(has_pair(&args, "-c:a", "libmp3lame"));
    }

    #[test]
    fn test_tempo_command_uses_chain_filter() {
        let chain = TempoChain::for_factor(3.0);
        let args = tempo_command(Path::new("a.mp3"), &chain, Path::new("b.mp3")).build_args();
        assert!(has_pair(&args, "-filter:a", "atempo=2.000000,atempo=1.500000"));
    }

    #[test]
    fn test_concat_command_flags_precede_list() {
        let args = concat_command(Path::new("list.txt"), Path::new("out.mp3")).build_args();
        let concat = args.iter().position(|a| a == "concat").unwrap();
        let input = args.iter().position(|a| a == "list.txt").unwrap();
        assert!(concat < input);
        assert!(has_pair(&args, "-safe", "0"));
    }

    #[test]
    fn test_mux_command_with_subtitles() {
        let request = MuxRequest {
            video: "movie.mp4".into(),
            audio: "dubbed.mp3".into(),
            subtitles: Some("movie_ru.srt".into()),
            output: "movie_ru.mp4".into(),
            language: "ru".into(),
        };
        let args = mux_command(&request).build_args();
        assert!(has_pair(&args, "-map", "2:s:0"));
        assert!(has_pair(&args, "-c:s", "mov_text"));
        assert!(has_pair(&args, "-c:v", "copy"));
        assert!(has_pair(&args, "-metadata:s:s:0", "language=ru"));
    }

    #[test]
    fn test_mux_command_without_subtitles() {
        let request = MuxRequest {
            video: "movie.mp4".into(),
            audio: "dubbed.mp3".into(),
            subtitles: None,
            output: "movie_ru.mp4".into(),
            language: "ru".into(),
        };
        let args = mux_command(&request).build_args();
        assert!(!args.iter().any(|a| a == "2:s:0"));
        assert!(!args.iter().any(|a| a == "-c:s"));
        assert!(has_pair(&args, "-metadata:s:a:0", "language=ru"));
    }

    #[tokio::test]
    async fn test_extract_missing_source() {
        let toolkit = FfmpegToolkit::new();
        let result = toolkit
            .extract_audio(
                Path::new("/nonexistent/movie.mp4"),
                Path::new("/tmp/out.mp3"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
