//! In-process fakes for the media toolkit and the external engines.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use subdub_media::{MediaError, MediaResult, MediaToolkit, MuxRequest, TempoChain};
use subdub_models::{BilingualSegment, SubtitleFormat, Transcript, Word};
use subdub_worker::{
    CollaboratorError, CollaboratorResult, Collaborators, SpeechRecognizer, SpeechSynthesizer,
    SubtitleWriter, Translator,
};

async fn write_stub(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

/// Media toolkit that writes placeholder files and records every call.
#[derive(Default)]
pub struct FakeMedia {
    pub calls: Mutex<Vec<String>>,
    pub mux_requests: Mutex<Vec<MuxRequest>>,
    /// Duration reported for every probed file
    pub probed_duration: Mutex<Option<f64>>,
}

impl FakeMedia {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn extract_audio(
        &self,
        _source: &Path,
        output: &Path,
        _cancel: &CancellationToken,
    ) -> MediaResult<()> {
        self.record("extract_audio");
        write_stub(output, "audio").await?;
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        self.record("probe_duration");
        match *self.probed_duration.lock().unwrap() {
            Some(d) => Ok(d),
            None => Err(MediaError::internal(format!("no duration for {}", path.display()))),
        }
    }

    async fn transform_tempo(
        &self,
        _input: &Path,
        chain: &TempoChain,
        output: &Path,
        _cancel: &CancellationToken,
    ) -> MediaResult<()> {
        self.record(format!("transform_tempo {}", chain.to_filter()));
        write_stub(output, "tempo").await?;
        Ok(())
    }

    async fn generate_silence(
        &self,
        duration: f64,
        output: &Path,
        _cancel: &CancellationToken,
    ) -> MediaResult<()> {
        self.record(format!("generate_silence {duration:.3}"));
        write_stub(output, "silence").await?;
        Ok(())
    }

    async fn concat(
        &self,
        _list_file: &Path,
        output: &Path,
        _cancel: &CancellationToken,
    ) -> MediaResult<()> {
        self.record("concat");
        write_stub(output, "dubbed").await?;
        Ok(())
    }

    async fn mux(&self, request: &MuxRequest, _cancel: &CancellationToken) -> MediaResult<()> {
        self.record("mux");
        self.mux_requests.lock().unwrap().push(request.clone());
        write_stub(&request.output, "video").await?;
        Ok(())
    }
}

/// Recognizer returning a fixed transcript.
pub struct FakeRecognizer {
    pub transcript: Transcript,
    pub initialized: AtomicUsize,
    /// Models passed to `initialize`, in call order
    pub models: Mutex<Vec<String>>,
    /// Name of the span that was current during the last `transcribe`
    pub transcribed_in: Mutex<Option<&'static str>>,
}

impl FakeRecognizer {
    pub fn new(words: Vec<Word>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            transcript: Transcript {
                text,
                words,
                language: Some("en".into()),
                duration: None,
            },
            initialized: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
            transcribed_in: Mutex::new(None),
        }
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn initialize(&self, model: &str, _cancel: &CancellationToken) -> CollaboratorResult<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        Ok(())
    }

    async fn transcribe(
        &self,
        _audio: &Path,
        _language: &str,
        _cancel: &CancellationToken,
    ) -> CollaboratorResult<Transcript> {
        *self.transcribed_in.lock().unwrap() =
            tracing::Span::current().metadata().map(|m| m.name());
        Ok(self.transcript.clone())
    }
}

/// How the fake translator behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranslatorMode {
    Echo,
    /// Fail on the given call (1-based)
    FailOn(usize),
    /// Trigger the job's cancellation token on the given call (1-based)
    CancelOn(usize),
}

pub struct FakeTranslator {
    pub mode: TranslatorMode,
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn new(mode: TranslatorMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
        cancel: &CancellationToken,
    ) -> CollaboratorResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode {
            TranslatorMode::FailOn(k) if k == n => {
                Err(CollaboratorError::failed("translation service unavailable"))
            }
            TranslatorMode::CancelOn(k) if k == n => {
                cancel.cancel();
                Ok(format!("[{target_language}] {text}"))
            }
            _ => Ok(format!("[{target_language}] {text}")),
        }
    }
}

/// Synthesizer writing a placeholder clip per call.
#[derive(Default)]
pub struct FakeSynthesizer {
    pub outputs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        output: &Path,
        _cancel: &CancellationToken,
    ) -> CollaboratorResult<()> {
        write_stub(output, text)
            .await
            .map_err(|e| CollaboratorError::failed(e.to_string()))?;
        self.outputs.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }
}

/// Subtitle writer recording what it was asked to write.
#[derive(Default)]
pub struct FakeSubtitles {
    pub writes: Mutex<Vec<(Vec<BilingualSegment>, PathBuf, Option<PathBuf>)>>,
}

#[async_trait]
impl SubtitleWriter for FakeSubtitles {
    async fn write(
        &self,
        _format: SubtitleFormat,
        segments: &[BilingualSegment],
        original: &Path,
        translated: Option<&Path>,
        _cancel: &CancellationToken,
    ) -> CollaboratorResult<()> {
        let io = |e: std::io::Error| CollaboratorError::failed(e.to_string());
        write_stub(original, "original").await.map_err(io)?;
        if let Some(path) = translated {
            write_stub(path, "translated").await.map_err(io)?;
        }
        self.writes.lock().unwrap().push((
            segments.to_vec(),
            original.to_path_buf(),
            translated.map(Path::to_path_buf),
        ));
        Ok(())
    }
}

/// Three sentences: a one second pause after the first, none after the second.
pub fn sample_words() -> Vec<Word> {
    vec![
        Word::new("Hello", 0.0, 0.5),
        Word::new("world.", 0.5, 1.0),
        Word::new("This", 2.0, 2.3),
        Word::new("is", 2.3, 2.5),
        Word::new("a", 2.5, 2.6),
        Word::new("test.", 2.6, 3.0),
        Word::new("Goodbye", 3.0, 3.5),
        Word::new("now.", 3.5, 4.0),
    ]
}

pub struct Fakes {
    pub media: Arc<FakeMedia>,
    pub recognizer: Arc<FakeRecognizer>,
    pub translator: Arc<FakeTranslator>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub subtitles: Arc<FakeSubtitles>,
}

impl Fakes {
    pub fn new(translator: TranslatorMode) -> Self {
        Self {
            media: Arc::new(FakeMedia::default()),
            recognizer: Arc::new(FakeRecognizer::new(sample_words())),
            translator: Arc::new(FakeTranslator::new(translator)),
            synthesizer: Arc::new(FakeSynthesizer::default()),
            subtitles: Arc::new(FakeSubtitles::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            media: self.media.clone(),
            recognizer: self.recognizer.clone(),
            translator: self.translator.clone(),
            synthesizer: self.synthesizer.clone(),
            subtitles: self.subtitles.clone(),
        }
    }
}
