//! Configuration loaded from `~/.config/reelsmith/config.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.
//! Secrets and deployment paths come from the environment and override the
//! file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Voice used when the configured voice cannot be synthesized.
pub const DEFAULT_FALLBACK_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// Themed queries rotated through when a job has no explicit footage query.
pub const THEMED_QUERIES: [&str; 10] = [
    "golden hour sunset silhouette cinematic",
    "spiritual light rays nature cinematic",
    "sunset reflection water peaceful",
    "sunrise hope landscape dramatic",
    "silhouette person praying sunset",
    "cinematic sky clouds dramatic light",
    "peaceful nature golden hour",
    "contemplative person alone sunset",
    "spiritual journey cinematic",
    "hope light darkness cinematic",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub speech: SpeechConfig,
    pub transcription: TranscriptionConfig,
    pub footage: FootageConfig,
    pub canvas: CanvasConfig,
    pub captions: CaptionConfig,
    pub audio: AudioConfig,
    pub tools: ToolsConfig,
    pub job: JobConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for narration, clips, captions and final videos
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("reelsmith"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub voice_id: String,
    pub fallback_voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub seed: Option<u32>,
    /// Length of the silent narration used for an empty script
    pub silent_narration_secs: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.elevenlabs.io".to_string(),
            voice_id: DEFAULT_FALLBACK_VOICE.to_string(),
            fallback_voice_id: DEFAULT_FALLBACK_VOICE.to_string(),
            model_id: "eleven_turbo_v2_5".to_string(),
            output_format: "mp3_44100_128".to_string(),
            seed: Some(42),
            silent_narration_secs: 5.0,
        }
    }
}

/// Which transcription back-ends are tried, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptionBackend {
    Openai,
    WhisperCli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backends: Vec<TranscriptionBackend>,
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// Local whisper executable (or "whisper" for PATH lookup)
    pub whisper_path: String,
    pub whisper_model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backends: vec![TranscriptionBackend::Openai],
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            whisper_path: "whisper".to_string(),
            whisper_model: "base".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FootageConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    /// Seconds of footage each clip contributes
    pub unit_clip_secs: f64,
    /// Extra clips beyond what the duration strictly needs
    pub slack: usize,
    /// Raw candidates requested per selected clip
    pub overfetch: usize,
    /// Provider page size cap
    pub max_page_size: usize,
    pub min_duration_secs: f64,
    pub min_score: u32,
    pub download_concurrency: usize,
    /// Appended to explicit queries
    pub query_suffix: String,
    /// Queries that mean "no preference" and trigger rotation
    pub generic_queries: Vec<String>,
    pub themed_queries: Vec<String>,
}

impl Default for FootageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.pexels.com".to_string(),
            unit_clip_secs: 2.5,
            slack: 2,
            overfetch: 3,
            max_page_size: 40,
            min_duration_secs: 5.0,
            min_score: 3,
            download_concurrency: 3,
            query_suffix: "cinematic golden hour".to_string(),
            generic_queries: vec![
                "spirituality faith peaceful".to_string(),
                "faith prayer spiritual light hope peace nature".to_string(),
            ],
            themed_queries: THEMED_QUERIES.iter().map(|q| (*q).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub group_size: usize,
    pub font_name: String,
    pub font_size: u32,
    /// ASS colour override for the spoken word (&HBBGGRR&)
    pub highlight_color: String,
    /// ASS colour override for every other word
    pub base_color: String,
    pub outline: f32,
    pub shadow: f32,
    pub uppercase: bool,
    /// Fraction of the canvas height reserved for platform UI at the top
    pub safe_top: f32,
    /// Fraction of the canvas height reserved for platform UI at the bottom
    pub safe_bottom: f32,
    /// Horizontal margin on each side in canvas pixels
    pub safe_side: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            group_size: 4,
            font_name: "Poppins ExtraBold".to_string(),
            font_size: 66,
            highlight_color: "&H00FFFF&".to_string(),
            base_color: "&HFFFFFF&".to_string(),
            outline: 3.0,
            shadow: 8.0,
            uppercase: true,
            safe_top: 0.15,
            safe_bottom: 0.25,
            safe_side: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub narration_volume: f32,
    pub music_volume: f32,
    /// Compress the music whenever narration is present
    pub duck: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            narration_volume: 1.0,
            music_volume: 0.3,
            duck: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: find_binary("ffmpeg"),
            ffprobe_path: find_binary("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Fail a job that is still running after this many seconds
    pub deadline_secs: Option<u64>,
}

/// Resolve a binary through PATH, falling back to the bare name.
pub fn find_binary(name: &str) -> String {
    which::which(name).map_or_else(|_| name.to_string(), |p| p.to_string_lossy().to_string())
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing default file yields defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ELEVENLABS_API_KEY") {
            self.speech.api_key = Some(key);
        }
        if let Some(voice) = lookup("ELEVENLABS_VOICE_ID") {
            self.speech.voice_id = voice;
        }
        if let Some(key) = lookup("PEXELS_API_KEY") {
            self.footage.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.transcription.api_key = Some(key);
        }
        if let Some(dir) = lookup("VIDEO_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.tools.ffmpeg_path = path;
        }
        if let Some(path) = lookup("FFPROBE_PATH") {
            self.tools.ffprobe_path = path;
        }
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelsmith")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.canvas.width, 1080);
        assert_eq!(config.canvas.height, 1920);
        assert_eq!(config.captions.group_size, 4);
        assert!((config.footage.unit_clip_secs - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.footage.themed_queries.len(), 10);
        assert_eq!(config.speech.fallback_voice_id, DEFAULT_FALLBACK_VOICE);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[footage]
download_concurrency = 5
min_score = 2

[transcription]
backends = ["whisper-cli", "openai"]

[job]
deadline_secs = 600
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.footage.download_concurrency, 5);
        assert_eq!(config.footage.min_score, 2);
        assert_eq!(config.footage.overfetch, 3);
        assert_eq!(
            config.transcription.backends,
            vec![TranscriptionBackend::WhisperCli, TranscriptionBackend::Openai]
        );
        assert_eq!(config.job.deadline_secs, Some(600));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("ELEVENLABS_API_KEY", "el-key"),
            ("ELEVENLABS_VOICE_ID", "voice-123"),
            ("PEXELS_API_KEY", "px-key"),
            ("VIDEO_OUTPUT_DIR", "/srv/videos"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.speech.api_key.as_deref(), Some("el-key"));
        assert_eq!(config.speech.voice_id, "voice-123");
        assert_eq!(config.footage.api_key.as_deref(), Some("px-key"));
        assert_eq!(config.output.dir, PathBuf::from("/srv/videos"));
        assert!(config.transcription.api_key.is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/reelsmith.toml"))).is_err());
    }
}
