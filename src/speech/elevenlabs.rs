//! ElevenLabs text-to-speech with character timestamps
//!
//! Uses the `/with-timestamps` endpoint, which returns base64 audio plus a
//! per-character alignment. Characters are folded into whitespace-delimited
//! words to give provider-native word timings.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{SpeechProvider, Synthesis, VoiceConfig};
use crate::config::SpeechConfig;
use crate::error::ProviderError;
use crate::http_client::{build_client, check_status};
use crate::timing::WordTiming;

const PROVIDER: &str = "elevenlabs";
pub struct ElevenLabsProvider {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model_id: String,
    output_format: String,
    seed: Option<u32>,
}

impl ElevenLabsProvider {
    pub fn new(config: &SpeechConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(PROVIDER)?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
            seed: config.seed,
        })
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl From<&VoiceConfig> for VoiceSettings {
    fn from(v: &VoiceConfig) -> Self {
        Self {
            stability: v.stability,
            similarity_boost: v.similarity,
            style: v.style,
            use_speaker_boost: v.speaker_boost,
        }
    }
}

#[derive(Deserialize)]
struct TtsResponse {
    audio_base64: String,
    #[serde(default)]
    alignment: Option<CharacterAlignment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CharacterAlignment {
    characters: Vec<String>,
    character_start_times_seconds: Vec<f64>,
    character_end_times_seconds: Vec<f64>,
}

/// Fold per-character timings into words.
///
/// A word spans from its first character's start to its last character's
/// end. Whitespace characters close the current word.
pub(crate) fn fold_characters(alignment: &CharacterAlignment) -> Vec<WordTiming> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut start = 0.0;
    let mut end = 0.0;

    let chars = alignment
        .characters
        .iter()
        .zip(&alignment.character_start_times_seconds)
        .zip(&alignment.character_end_times_seconds);

    for ((ch, &ch_start), &ch_end) in chars {
        if ch.chars().all(char::is_whitespace) {
            if !current.is_empty() {
                words.push(WordTiming::new(std::mem::take(&mut current), start, end));
            }
            continue;
        }
        if current.is_empty() {
            start = ch_start;
        }
        current.push_str(ch);
        end = ch_end;
    }
    if !current.is_empty() {
        words.push(WordTiming::new(current, start, end));
    }

    words
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self, text, voice), fields(chars = text.len()))]
    async fn synthesize(&self, text: &str, voice_id: &str, voice: &VoiceConfig) -> Result<Synthesis, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            provider: PROVIDER,
            message: "ELEVENLABS_API_KEY is not set".to_string(),
        })?;

        let url = format!("{}/v1/text-to-speech/{voice_id}/with-timestamps", self.api_base);
        let body = TtsRequest {
            text,
            model_id: &self.model_id,
            voice_settings: voice.into(),
            seed: self.seed,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        let response = check_status(PROVIDER, response).await?;

        let parsed: TtsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(parsed.audio_base64.as_bytes())
            .map_err(|e| ProviderError::malformed(PROVIDER, format!("audio_base64: {e}")))?;
        if audio.is_empty() {
            return Err(ProviderError::malformed(PROVIDER, "empty audio"));
        }

        let alignment = parsed.alignment.as_ref().map(fold_characters);
        debug!(
            bytes = audio.len(),
            words = alignment.as_ref().map_or(0, Vec::len),
            "Synthesized"
        );

        Ok(Synthesis {
            audio: audio.into(),
            alignment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(text: &str, step: f64) -> CharacterAlignment {
        let characters: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let n = characters.len();
        CharacterAlignment {
            characters,
            character_start_times_seconds: (0..n).map(|i| i as f64 * step).collect(),
            character_end_times_seconds: (0..n).map(|i| (i + 1) as f64 * step).collect(),
        }
    }

    #[test]
    fn test_fold_characters_into_words() {
        let words = fold_characters(&alignment("Be still, now", 0.1));
        let texts: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(texts, vec!["Be", "still,", "now"]);

        assert!((words[0].start - 0.0).abs() < 1e-9);
        assert!((words[0].end - 0.2).abs() < 1e-9);
        assert!((words[1].start - 0.3).abs() < 1e-9);
        assert!((words[2].end - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_api_base_comes_from_config() {
        let config = SpeechConfig {
            api_base: "http://127.0.0.1:9/".to_string(),
            ..Default::default()
        };
        let provider = ElevenLabsProvider::new(&config).unwrap();
        assert_eq!(provider.api_base, "http://127.0.0.1:9");
    }

    #[test]
    fn test_fold_characters_collapses_repeated_whitespace() {
        let words = fold_characters(&alignment("  a \n b  ", 0.05));
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "audio_base64": "SUQz",
            "alignment": {
                "characters": ["H", "i"],
                "character_start_times_seconds": [0.0, 0.1],
                "character_end_times_seconds": [0.1, 0.25]
            }
        }"#;
        let parsed: TtsResponse = serde_json::from_str(json).unwrap();
        let words = fold_characters(parsed.alignment.as_ref().unwrap());
        assert_eq!(words, vec![WordTiming::new("Hi", 0.0, 0.25)]);
    }

    #[test]
    fn test_request_body_shape() {
        let voice = VoiceConfig::default();
        let body = TtsRequest {
            text: "hello",
            model_id: "eleven_turbo_v2_5",
            voice_settings: (&voice).into(),
            seed: Some(42),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["voice_settings"]["use_speaker_boost"], true);
        assert_eq!(json["seed"], 42);
        assert_eq!(json["model_id"], "eleven_turbo_v2_5");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let provider = ElevenLabsProvider::new(&SpeechConfig::default()).unwrap();
        let err = provider
            .synthesize("hi", "voice", &VoiceConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }
}
