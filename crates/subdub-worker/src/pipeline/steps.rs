//! Individual pipeline steps.

use std::path::Path;
use tokio_util::sync::CancellationToken;

use subdub_media::fs_utils::move_file;
use subdub_media::{assemble_speech_track, MuxRequest, TempoCorrector};
use subdub_models::{BilingualSegment, Job, OutputFiles, PipelineMode, Segment, SpeechClip, Step};

use super::{JobWorkspace, PipelineExecutor, Stage, StepReporter};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::segmenter::SegmentPolicy;

/// Everything a step needs besides the stage it consumes.
pub(super) struct StepContext<'a> {
    pub job: &'a Job,
    pub workspace: &'a JobWorkspace,
    pub cancel: &'a CancellationToken,
    pub reporter: StepReporter<'a>,
    pub logger: &'a JobLogger,
}

impl StepContext<'_> {
    fn checkpoint(&self) -> WorkerResult<()> {
        if self.cancel.is_cancelled() {
            Err(WorkerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl PipelineExecutor {
    /// Run `step` on `stage`, producing the next stage.
    pub(super) async fn advance(
        &self,
        step: Step,
        stage: Stage,
        ctx: &StepContext<'_>,
        outputs: &mut OutputFiles,
    ) -> WorkerResult<Stage> {
        match (step, stage) {
            (Step::ExtractAudio, Stage::Start) => self.extract_audio(ctx).await,
            (Step::Transcribe, Stage::Extracted { audio }) => self.transcribe(ctx, &audio).await,
            (Step::Translate, Stage::Segmented { segments }) => {
                self.translate(ctx, &segments).await
            }
            (Step::GenerateSubtitles, Stage::Segmented { segments }) => {
                let bilingual: Vec<BilingualSegment> =
                    segments.iter().map(BilingualSegment::untranslated).collect();
                self.write_subtitles(ctx, bilingual, false, outputs).await
            }
            (Step::GenerateSubtitles, Stage::Translated { bilingual }) => {
                self.write_subtitles(ctx, bilingual, true, outputs).await
            }
            (Step::GenerateSpeech, Stage::Translated { bilingual }) => {
                self.synthesize(ctx, &bilingual).await
            }
            (Step::AssembleAudio, Stage::Synthesized { clips }) => {
                self.assemble(ctx, &clips).await
            }
            (Step::ComposeVideo, Stage::Assembled { audio }) => {
                self.compose(ctx, &audio, outputs).await
            }
            (step, stage) => Err(WorkerError::internal(format!(
                "step {} cannot run after stage {}",
                step, stage
            ))),
        }
    }

    async fn extract_audio(&self, ctx: &StepContext<'_>) -> WorkerResult<Stage> {
        let audio = ctx.workspace.extracted_audio();
        self.collaborators
            .media
            .extract_audio(&ctx.job.source, &audio, ctx.cancel)
            .await
            .map_err(|e| WorkerError::from_media(Step::ExtractAudio, e))?;

        Ok(Stage::Extracted { audio })
    }

    /// Make sure the recognizer holds the job's model.
    ///
    /// The lock is held across initialization so concurrent jobs never see a
    /// half-switched recognizer.
    async fn ensure_recognizer(&self, ctx: &StepContext<'_>) -> WorkerResult<()> {
        let model = &ctx.job.config.recognizer_model;
        let mut loaded = self.recognizer_model.lock().await;
        if loaded.as_deref() == Some(model.as_str()) {
            return Ok(());
        }

        if let Some(previous) = loaded.as_deref() {
            ctx.logger.log_progress(&format!(
                "Recognizer loaded with model '{}', switching to '{}'",
                previous, model
            ));
        }
        self.collaborators
            .recognizer
            .initialize(model, ctx.cancel)
            .await
            .map_err(|e| WorkerError::from_collaborator(Step::Transcribe, e))?;
        *loaded = Some(model.clone());
        Ok(())
    }

    async fn transcribe(&self, ctx: &StepContext<'_>, audio: &Path) -> WorkerResult<Stage> {
        self.ensure_recognizer(ctx).await?;
        ctx.checkpoint()?;

        let config = &ctx.job.config;
        let transcript = self
            .collaborators
            .recognizer
            .transcribe(audio, &config.source_language, ctx.cancel)
            .await
            .map_err(|e| WorkerError::from_collaborator(Step::Transcribe, e))?;

        let policy = SegmentPolicy::new(config.fixed_segments, config.fixed_segment_duration);
        let segments = self.segmenter.segment(&transcript.words, policy);
        if segments.is_empty() && !transcript.words.is_empty() {
            return Err(WorkerError::SegmentationEmpty(transcript.word_count()));
        }

        ctx.logger.log_progress(&format!(
            "Transcribed {} words into {} segments",
            transcript.word_count(),
            segments.len()
        ));
        Ok(Stage::Segmented { segments })
    }

    async fn translate(&self, ctx: &StepContext<'_>, segments: &[Segment]) -> WorkerResult<Stage> {
        let config = &ctx.job.config;
        let mut bilingual = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            ctx.checkpoint()?;
            let translated = self
                .collaborators
                .translator
                .translate(
                    &segment.text,
                    &config.source_language,
                    &config.target_language,
                    ctx.cancel,
                )
                .await
                .map_err(|e| WorkerError::from_collaborator(Step::Translate, e))?;
            bilingual.push(BilingualSegment::new(segment, translated));
            ctx.reporter.units(i + 1, segments.len());
        }

        Ok(Stage::Translated { bilingual })
    }

    async fn write_subtitles(
        &self,
        ctx: &StepContext<'_>,
        bilingual: Vec<BilingualSegment>,
        translated: bool,
        outputs: &mut OutputFiles,
    ) -> WorkerResult<Stage> {
        let original_path = ctx.workspace.original_subtitles();
        let translated_path = translated.then(|| ctx.workspace.translated_subtitles());

        self.collaborators
            .subtitles
            .write(
                ctx.job.config.subtitle_format,
                &bilingual,
                &original_path,
                translated_path.as_deref(),
                ctx.cancel,
            )
            .await
            .map_err(|e| WorkerError::from_collaborator(Step::GenerateSubtitles, e))?;

        outputs.original_subtitles = Some(original_path);
        if let Some(path) = translated_path {
            outputs.translated_subtitles = Some(path);
        }
        Ok(Stage::Translated { bilingual })
    }

    async fn synthesize(
        &self,
        ctx: &StepContext<'_>,
        bilingual: &[BilingualSegment],
    ) -> WorkerResult<Stage> {
        let config = &ctx.job.config;
        let tts_dir = ctx.workspace.tts_dir();
        tokio::fs::create_dir_all(&tts_dir).await.map_err(|e| {
            WorkerError::synthesis_failed(format!("cannot create {}: {}", tts_dir.display(), e))
        })?;

        let media = self.collaborators.media.as_ref();
        let corrector = TempoCorrector::new(media);
        let mut clips = Vec::with_capacity(bilingual.len());

        for (i, segment) in bilingual.iter().enumerate() {
            ctx.checkpoint()?;

            let mut clip = SpeechClip::new(i + 1, segment);
            let temp = tts_dir.join(format!("temp_{}", clip.file_name()));
            let path = tts_dir.join(clip.file_name());

            self.collaborators
                .synthesizer
                .synthesize(&clip.text, &config.voice, &temp, ctx.cancel)
                .await
                .map_err(|e| WorkerError::from_collaborator(Step::GenerateSpeech, e))?;

            let placed = if config.speed_sync {
                let outcome = corrector
                    .correct_to_duration(&temp, clip.duration(), &path, ctx.cancel)
                    .await;
                let _ = tokio::fs::remove_file(&temp).await;
                outcome.map(|o| {
                    tracing::debug!(
                        clip = clip.index,
                        target = clip.duration(),
                        actual = o.duration_or(clip.duration()),
                        "Speech clip timed"
                    );
                })
            } else {
                let moved = move_file(&temp, &path).await;
                if moved.is_err() {
                    let _ = tokio::fs::remove_file(&temp).await;
                }
                moved
            };
            placed.map_err(|e| WorkerError::from_media(Step::GenerateSpeech, e))?;

            clip.audio = Some(path);
            clips.push(clip);
            ctx.reporter.units(i + 1, bilingual.len());
        }

        Ok(Stage::Synthesized { clips })
    }

    async fn assemble(&self, ctx: &StepContext<'_>, clips: &[SpeechClip]) -> WorkerResult<Stage> {
        let audio = ctx.workspace.dubbed_audio();
        assemble_speech_track(
            self.collaborators.media.as_ref(),
            clips,
            &ctx.workspace.assembly_dir(),
            &audio,
            ctx.cancel,
        )
        .await
        .map_err(|e| WorkerError::from_media(Step::AssembleAudio, e))?;

        Ok(Stage::Assembled { audio })
    }

    async fn compose(
        &self,
        ctx: &StepContext<'_>,
        audio: &Path,
        outputs: &mut OutputFiles,
    ) -> WorkerResult<Stage> {
        let config = &ctx.job.config;
        let subtitles = match config.mode {
            PipelineMode::FullPipeline => outputs.translated_subtitles.clone(),
            _ => None,
        };
        let video = ctx.workspace.dubbed_video();

        let request = MuxRequest {
            video: ctx.job.source.clone(),
            audio: audio.to_path_buf(),
            subtitles,
            output: video.clone(),
            language: config.target_language.clone(),
        };
        self.collaborators
            .media
            .mux(&request, ctx.cancel)
            .await
            .map_err(|e| WorkerError::from_media(Step::ComposeVideo, e))?;

        outputs.dubbed_video = Some(video.clone());
        Ok(Stage::Composed { video })
    }
}
