//! In-memory stand-ins for every external collaborator.
//!
//! Media files written by [`FakeTranscoder`] contain nothing but their
//! duration in seconds, which [`FakeProbe`] reads back. Raw synthesized
//! audio from [`FakeSpeech`] is likewise just its duration, so tempo changes
//! can be checked end to end.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use reelsmith::config::Config;
use reelsmith::footage::Rendition;
use reelsmith::media::InputSource;
use reelsmith::{
    DownloadError, FootageCandidate, FootageProvider, MediaProbe, Orientation, Pipeline, Ports, ProviderError,
    SpeechProvider, Synthesis, ToolInvocationError, TranscodeRequest, Transcoder, TranscriptionProvider,
    VoiceConfig, WordTiming,
};

fn atempo_product(request: &TranscodeRequest) -> f64 {
    request
        .graph
        .filters()
        .filter_map(|f| f.strip_prefix("atempo="))
        .filter_map(|v| v.parse::<f64>().ok())
        .product()
}

/// Writes each output as its duration and records every request.
#[derive(Default)]
pub struct FakeTranscoder {
    pub requests: Mutex<Vec<TranscodeRequest>>,
    /// Fail any invocation whose output file name contains this
    pub fail_on: Option<&'static str>,
    /// Write a partial output, then hang, for outputs containing this
    pub stall_on: Option<&'static str>,
}

impl FakeTranscoder {
    pub fn failing_on(marker: &'static str) -> Self {
        Self {
            fail_on: Some(marker),
            ..Default::default()
        }
    }

    pub fn stalling_on(marker: &'static str) -> Self {
        Self {
            stall_on: Some(marker),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &'static str {
        "fake-ffmpeg"
    }

    async fn run(&self, request: &TranscodeRequest) -> Result<(), ToolInvocationError> {
        self.requests.lock().unwrap().push(request.clone());

        let file_name = request.output.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if let Some(marker) = self.fail_on {
            if file_name.contains(marker) {
                return Err(ToolInvocationError::new("ffmpeg", Some(1), "Conversion failed!"));
            }
        }
        if let Some(marker) = self.stall_on {
            if file_name.contains(marker) {
                let _ = tokio::fs::write(&request.output, "partial").await;
                std::future::pending::<()>().await;
            }
        }

        let duration = match request.duration {
            Some(d) => d,
            None => {
                let source = request.inputs.first().map(|i| &i.source);
                let raw = match source {
                    Some(InputSource::File(path)) => tokio::fs::read_to_string(path)
                        .await
                        .ok()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .unwrap_or(0.0),
                    _ => 0.0,
                };
                raw / atempo_product(request)
            }
        };

        tokio::fs::write(&request.output, duration.to_string())
            .await
            .map_err(|e| ToolInvocationError::new("ffmpeg", None, e.to_string()))
    }
}

/// Reads the duration a [`FakeTranscoder`] wrote.
pub struct FakeProbe;

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn duration(&self, path: &Path) -> Result<f64, ToolInvocationError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolInvocationError::new("ffprobe", None, e.to_string()))?;
        content
            .trim()
            .parse()
            .map_err(|_| ToolInvocationError::new("ffprobe", Some(1), format!("bad duration {content:?}")))
    }
}

/// Behaviour of [`FakeSpeech`].
#[derive(Clone)]
pub enum SpeechMode {
    /// Succeed with this raw duration and optional alignment
    Ok { duration: f64, alignment: Option<Vec<WordTiming>> },
    /// Fail for the listed voices, succeed for the rest
    FailVoices { voices: Vec<String>, duration: f64 },
    FailAll,
    Panic,
    Slow(Duration),
}

pub struct FakeSpeech {
    pub mode: SpeechMode,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new(mode: SpeechMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(duration: f64) -> Self {
        Self::new(SpeechMode::Ok {
            duration,
            alignment: None,
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn audio(duration: f64) -> Bytes {
    Bytes::from(duration.to_string())
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    fn name(&self) -> &'static str {
        "fake-tts"
    }

    async fn synthesize(&self, _text: &str, voice_id: &str, _voice: &VoiceConfig) -> Result<Synthesis, ProviderError> {
        self.calls.lock().unwrap().push(voice_id.to_string());
        match &self.mode {
            SpeechMode::Ok { duration, alignment } => Ok(Synthesis {
                audio: audio(*duration),
                alignment: alignment.clone(),
            }),
            SpeechMode::FailVoices { voices, duration } => {
                if voices.iter().any(|v| v == voice_id) {
                    Err(ProviderError::unavailable("fake-tts", format!("voice {voice_id} unavailable")))
                } else {
                    Ok(Synthesis {
                        audio: audio(*duration),
                        alignment: None,
                    })
                }
            }
            SpeechMode::FailAll => Err(ProviderError::unavailable("fake-tts", "service down")),
            SpeechMode::Panic => panic!("tts exploded"),
            SpeechMode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Synthesis {
                    audio: audio(3.0),
                    alignment: None,
                })
            }
        }
    }
}

/// Returns a fixed transcription, or fails.
pub struct FakeTranscriber {
    pub words: Option<Vec<WordTiming>>,
}

#[async_trait]
impl TranscriptionProvider for FakeTranscriber {
    fn name(&self) -> &'static str {
        "fake-whisper"
    }

    async fn transcribe(&self, _audio: &Path) -> Result<Vec<WordTiming>, ProviderError> {
        self.words
            .clone()
            .ok_or_else(|| ProviderError::unavailable("fake-whisper", "no model"))
    }
}

/// Footage search over a fixed candidate list.
#[derive(Default)]
pub struct FakeFootage {
    pub candidates: Vec<FootageCandidate>,
    pub search_fails: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeFootage {
    pub fn with_candidates(candidates: Vec<FootageCandidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FootageProvider for FakeFootage {
    fn name(&self) -> &'static str {
        "fake-footage"
    }

    async fn search(&self, query: &str, _: Orientation, _: usize) -> Result<Vec<FootageCandidate>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.search_fails {
            return Err(ProviderError::unavailable("fake-footage", "rate limited"));
        }
        Ok(self.candidates.clone())
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        if url.contains("broken") {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(Bytes::from_static(b"clip"))
    }
}

/// A portrait HD candidate that passes every filter.
pub fn candidate(id: &str, url: &str) -> FootageCandidate {
    let rendition = |w: u32, h: u32, quality: &str, url: String| Rendition {
        url,
        width: w,
        height: h,
        fps: Some(30.0),
        quality: Some(quality.to_string()),
    };
    FootageCandidate {
        id: id.to_string(),
        source_url: format!("https://footage.test/{id}"),
        width: 1080,
        height: 1920,
        duration: 10.0,
        renditions: vec![
            rendition(1080, 1920, "hd", url.to_string()),
            rendition(720, 1280, "sd", format!("{url}?sd")),
            rendition(1920, 1080, "hd", format!("{url}?landscape")),
        ],
    }
}

/// Point `config` at a stand-in `whisper` executable in `dir` that
/// transcribes every narration as the name of its job directory.
#[cfg(unix)]
pub fn install_fake_whisper(config: &mut Config, dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-whisper");
    std::fs::write(
        &script,
        r#"#!/bin/sh
audio="$1"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output_dir" ]; then out="$2"; fi
  shift
done
job=$(basename "$(dirname "$audio")")
stem=$(basename "$audio" .wav)
sleep 0.1
printf '{"segments":[{"words":[{"word":" %s","start":0.0,"end":3.0}]}]}' "$job" > "$out/$stem.json"
"#,
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    config.transcription.whisper_path = script.to_string_lossy().to_string();
}

/// Default config writing into `dir`.
pub fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.dir = dir.to_path_buf();
    config
}

/// Handles to the fakes behind a pipeline.
pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub speech: Arc<FakeSpeech>,
    pub footage: Arc<FakeFootage>,
    pub transcoder: Arc<FakeTranscoder>,
}

pub fn harness(
    config: &Config,
    speech: FakeSpeech,
    footage: FakeFootage,
    transcoder: FakeTranscoder,
    transcribers: Vec<Arc<dyn TranscriptionProvider>>,
) -> Harness {
    let speech = Arc::new(speech);
    let footage = Arc::new(footage);
    let transcoder = Arc::new(transcoder);

    let pipeline = Pipeline::with_ports(
        config,
        Ports {
            speech: speech.clone(),
            transcribers,
            footage: footage.clone(),
            transcoder: transcoder.clone(),
            probe: Arc::new(FakeProbe),
        },
    );

    Harness {
        pipeline: Arc::new(pipeline),
        speech,
        footage,
        transcoder,
    }
}
