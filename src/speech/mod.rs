//! Narration synthesis
//!
//! [`SpeechStage`] turns script text into a 44.1 kHz stereo WAV narration and
//! measures its duration. The configured voice is tried first and a fixed
//! fallback voice once after that. When the voice asks for a speed other than
//! 1.0 the raw audio is time-stretched, and the measured duration (and any
//! provider timing) describes the stretched track.

pub mod elevenlabs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ProviderError, Result};
use crate::media::{
    atempo_chain, EncodingProfile, FilterChain, FilterGraph, MediaInput, MediaProbe, TranscodeRequest,
    Transcoder,
};
use crate::timing::WordTiming;

pub use elevenlabs::ElevenLabsProvider;

/// Voice shaping parameters for one synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub stability: f32,
    pub similarity: f32,
    pub style: f32,
    pub speaker_boost: bool,
    /// Playback speed multiplier applied after synthesis
    pub speed: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stability: 0.7,
            similarity: 0.75,
            style: 0.5,
            speaker_boost: true,
            speed: 1.0,
        }
    }
}

impl VoiceConfig {
    /// Speed to apply, with unusable values treated as 1.0
    #[must_use]
    pub fn effective_speed(&self) -> f64 {
        if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            1.0
        }
    }

    fn needs_stretch(&self) -> bool {
        (self.effective_speed() - 1.0).abs() > 1e-6
    }
}

/// Raw provider output.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub audio: Bytes,
    /// Word timings reported by the provider, relative to the raw audio
    pub alignment: Option<Vec<WordTiming>>,
}

/// Text-to-speech back-end.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short lowercase provider name (e.g., `"elevenlabs"`).
    fn name(&self) -> &'static str;

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        voice: &VoiceConfig,
    ) -> std::result::Result<Synthesis, ProviderError>;
}

/// The narration track handed to later stages.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio_path: PathBuf,
    /// Measured length of the final (speed-adjusted) audio
    pub duration: f64,
    /// Provider timings, already scaled to the final audio
    pub native_timings: Option<Vec<WordTiming>>,
    /// Voice that produced the audio, `None` for silent narration
    pub voice_id: Option<String>,
    pub used_fallback_voice: bool,
}

pub struct SpeechStage {
    provider: Arc<dyn SpeechProvider>,
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn MediaProbe>,
    voice_id: String,
    fallback_voice_id: String,
    silent_secs: f64,
}

impl SpeechStage {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn MediaProbe>,
        voice_id: impl Into<String>,
        fallback_voice_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            transcoder,
            probe,
            voice_id: voice_id.into(),
            fallback_voice_id: fallback_voice_id.into(),
            silent_secs: 5.0,
        }
    }

    /// Length of the silent track produced for a script with no words
    #[must_use]
    pub fn with_silent_secs(mut self, secs: f64) -> Self {
        self.silent_secs = secs;
        self
    }

    /// Synthesize `script` into `work_dir/narration.wav`.
    pub async fn run(&self, script: &str, voice: &VoiceConfig, work_dir: &Path) -> Result<Narration> {
        let wav_path = work_dir.join("narration.wav");

        if script.trim().is_empty() {
            warn!(secs = self.silent_secs, "Empty script, generating silent narration");
            let request = TranscodeRequest::new(&wav_path, EncodingProfile::narration_wav())
                .input(MediaInput::lavfi("anullsrc=r=44100:cl=stereo"))
                .duration(self.silent_secs);
            self.transcoder.run(&request).await?;
            let duration = self.probe.duration(&wav_path).await?;
            return Ok(Narration {
                audio_path: wav_path,
                duration,
                native_timings: None,
                voice_id: None,
                used_fallback_voice: false,
            });
        }

        let (synthesis, voice_id, used_fallback_voice) = self.synthesize_with_fallback(script, voice).await?;

        let raw_path = work_dir.join("narration_raw.mp3");
        tokio::fs::write(&raw_path, &synthesis.audio).await?;

        let speed = voice.effective_speed();
        let mut request = TranscodeRequest::new(&wav_path, EncodingProfile::narration_wav())
            .input(MediaInput::file(&raw_path));
        if voice.needs_stretch() {
            info!(speed, "Applying tempo adjustment");
            let chain = atempo_chain(speed)
                .into_iter()
                .fold(FilterChain::new(["0:a"]), |chain, f| chain.filter(f))
                .to("a");
            request = request.graph(FilterGraph::new().chain(chain)).map("[a]");
        } else {
            request = request.map("0:a");
        }
        self.transcoder.run(&request).await?;

        let duration = self.probe.duration(&wav_path).await?;
        let native_timings = synthesis
            .alignment
            .filter(|t| !t.is_empty())
            .map(|timings| timings.iter().map(|t| t.scaled(speed)).collect());

        info!(voice = %voice_id, duration, "Narration ready");
        Ok(Narration {
            audio_path: wav_path,
            duration,
            native_timings,
            voice_id: Some(voice_id),
            used_fallback_voice,
        })
    }

    async fn synthesize_with_fallback(
        &self,
        script: &str,
        voice: &VoiceConfig,
    ) -> std::result::Result<(Synthesis, String, bool), ProviderError> {
        let attempts = [(&self.voice_id, false), (&self.fallback_voice_id, true)];
        let mut last_err = None;

        for (voice_id, is_fallback) in attempts {
            match self.provider.synthesize(script, voice_id, voice).await {
                Ok(synthesis) => return Ok((synthesis, voice_id.clone(), is_fallback)),
                Err(e) => {
                    warn!(provider = self.provider.name(), voice = %voice_id, "Synthesis failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::unavailable(self.provider.name(), "no voice attempted")))
    }
}
