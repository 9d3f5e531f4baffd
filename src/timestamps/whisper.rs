//! Word-level transcription back-ends
//!
//! Supports both the hosted Whisper API (multipart upload) and a local
//! `whisper` CLI writing JSON with word timestamps.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::TranscriptionConfig;
use crate::error::ProviderError;
use crate::http_client::{build_client, check_status};
use crate::timing::WordTiming;

/// Transcribes narration audio into timed words.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcribe(&self, audio: &Path) -> Result<Vec<WordTiming>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscript {
    #[serde(default)]
    words: Vec<ApiWord>,
}

impl From<ApiWord> for WordTiming {
    fn from(w: ApiWord) -> Self {
        WordTiming::new(w.word.trim(), w.start, w.end)
    }
}

/// Hosted Whisper transcription (`/audio/transcriptions`).
pub struct OpenAiTranscriber {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
}

impl OpenAiTranscriber {
    const PROVIDER: &'static str = "openai-whisper";

    pub fn new(config: &TranscriptionConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(Self::PROVIDER)?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TranscriptionProvider for OpenAiTranscriber {
    fn name(&self) -> &'static str {
        Self::PROVIDER
    }

    #[instrument(skip(self), fields(audio = %audio.display()))]
    async fn transcribe(&self, audio: &Path) -> Result<Vec<WordTiming>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            provider: Self::PROVIDER,
            message: "OPENAI_API_KEY is not set".to_string(),
        })?;

        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| ProviderError::unavailable(Self::PROVIDER, format!("reading {}: {e}", audio.display())))?;
        let file_name = audio
            .file_name()
            .map_or_else(|| "narration.wav".to_string(), |n| n.to_string_lossy().to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|source| ProviderError::Http {
                provider: Self::PROVIDER,
                source,
            })?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: Self::PROVIDER,
                source,
            })?;
        let response = check_status(Self::PROVIDER, response).await?;

        let transcript: VerboseTranscript = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(Self::PROVIDER, e.to_string()))?;

        debug!(words = transcript.words.len(), "Transcribed");
        Ok(transcript.words.into_iter().map(WordTiming::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct CliOutput {
    #[serde(default)]
    segments: Vec<CliSegment>,
}

#[derive(Debug, Deserialize)]
struct CliSegment {
    #[serde(default)]
    words: Vec<ApiWord>,
}

/// Flatten the CLI's segment/word JSON into timed words.
pub(crate) fn parse_cli_output(json: &str) -> Result<Vec<WordTiming>, serde_json::Error> {
    let output: CliOutput = serde_json::from_str(json)?;
    Ok(output
        .segments
        .into_iter()
        .flat_map(|s| s.words)
        .map(WordTiming::from)
        .filter(|w| !w.word.is_empty())
        .collect())
}

/// Local `whisper` executable.
///
/// Transcripts are written next to the audio, in a `transcripts/` directory
/// of its own, so jobs transcribing at the same time never touch each
/// other's files.
pub struct WhisperCli {
    whisper_path: String,
    model: String,
}

impl WhisperCli {
    const PROVIDER: &'static str = "whisper-cli";

    #[must_use]
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            whisper_path: config.whisper_path.clone(),
            model: config.whisper_model.clone(),
        }
    }

    fn output_dir(audio: &Path) -> PathBuf {
        audio.parent().unwrap_or_else(|| Path::new(".")).join("transcripts")
    }

    fn build_args(&self, audio: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            audio.to_string_lossy().to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
            "--word_timestamps".to_string(),
            "True".to_string(),
        ]
    }

    /// Check if the executable answers `--help`
    pub async fn check_available(&self) -> bool {
        Command::new(&self.whisper_path)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperCli {
    fn name(&self) -> &'static str {
        Self::PROVIDER
    }

    async fn transcribe(&self, audio: &Path) -> Result<Vec<WordTiming>, ProviderError> {
        let output_dir = Self::output_dir(audio);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| ProviderError::unavailable(Self::PROVIDER, format!("{}: {e}", output_dir.display())))?;
        let args = self.build_args(audio, &output_dir);
        debug!("Running whisper with args: {:?}", args);

        let output = Command::new(&self.whisper_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProviderError::unavailable(Self::PROVIDER, format!("failed to spawn {}: {e}", self.whisper_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::unavailable(
                Self::PROVIDER,
                format!("whisper exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stem = audio
            .file_stem()
            .map_or_else(|| "narration".to_string(), |s| s.to_string_lossy().to_string());
        let json_path = output_dir.join(format!("{stem}.json"));
        let content = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| ProviderError::malformed(Self::PROVIDER, format!("{}: {e}", json_path.display())))?;
        let _ = tokio::fs::remove_file(&json_path).await;

        parse_cli_output(&content).map_err(|e| ProviderError::malformed(Self::PROVIDER, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbose_json() {
        let json = r#"{"text":"hi there","words":[{"word":"hi","start":0.0,"end":0.3},{"word":" there","start":0.3,"end":0.8}]}"#;
        let t: VerboseTranscript = serde_json::from_str(json).unwrap();
        let words: Vec<WordTiming> = t.words.into_iter().map(WordTiming::from).collect();
        assert_eq!(words[1], WordTiming::new("there", 0.3, 0.8));
    }

    #[test]
    fn test_verbose_json_without_words() {
        let t: VerboseTranscript = serde_json::from_str(r#"{"text":""}"#).unwrap();
        assert!(t.words.is_empty());
    }

    #[test]
    fn test_parse_cli_output_flattens_segments() {
        let json = r#"{
            "text": "one two three",
            "segments": [
                {"start": 0.0, "end": 0.9, "text": "one two", "words": [
                    {"word": " one", "start": 0.0, "end": 0.4, "probability": 0.9},
                    {"word": " two", "start": 0.4, "end": 0.9, "probability": 0.8}
                ]},
                {"start": 0.9, "end": 1.5, "text": "three", "words": [
                    {"word": " three", "start": 0.9, "end": 1.5}
                ]}
            ],
            "language": "en"
        }"#;
        let words = parse_cli_output(json).unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(words[2].word, "three");
    }

    #[test]
    fn test_cli_args_request_word_timestamps() {
        let cli = WhisperCli::new(&TranscriptionConfig::default());
        let audio = Path::new("/tmp/job-1/narration.wav");
        let args = cli.build_args(audio, &WhisperCli::output_dir(audio));
        assert_eq!(args[0], "/tmp/job-1/narration.wav");
        assert!(args.windows(2).any(|w| w[0] == "--output_dir" && w[1] == "/tmp/job-1/transcripts"));
        assert!(args.windows(2).any(|w| w[0] == "--word_timestamps" && w[1] == "True"));
        assert!(args.windows(2).any(|w| w[0] == "--output_format" && w[1] == "json"));
    }

    #[tokio::test]
    async fn test_openai_without_key_is_not_configured() {
        let t = OpenAiTranscriber::new(&TranscriptionConfig::default()).unwrap();
        let err = t.transcribe(Path::new("/tmp/none.wav")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }

    /// A stand-in `whisper` that transcribes every file as the name of the
    /// directory holding it.
    #[cfg(unix)]
    fn fake_whisper(dir: &Path) -> TranscriptionConfig {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("whisper");
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
sleep 0.2
printf '{"segments":[{"words":[{"word":" %s","start":0.0,"end":1.0}]}]}' "$job" > "$out/$stem.json"
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        TranscriptionConfig {
            whisper_path: script.to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_transcriptions_keep_their_own_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = WhisperCli::new(&fake_whisper(dir.path()));
        for job in ["job-a", "job-b"] {
            std::fs::create_dir_all(dir.path().join(job)).unwrap();
        }
        let audio_a = dir.path().join("job-a").join("narration.wav");
        let audio_b = dir.path().join("job-b").join("narration.wav");

        let (a, b) = tokio::join!(cli.transcribe(&audio_a), cli.transcribe(&audio_b));

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].word, "job-a");
        assert_eq!(b[0].word, "job-b");
        assert!(dir.path().join("job-a").join("transcripts").is_dir());
        assert!(!dir.path().join("transcripts").exists());
    }
}
