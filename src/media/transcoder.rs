//! External transcoder port and its ffmpeg implementation

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::filter::FilterGraph;
use crate::error::ToolInvocationError;

/// Where an input stream comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    /// A libavfilter source expression (`anullsrc=r=44100:cl=stereo`)
    Lavfi(String),
}

/// One `-i` input with its per-input options.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub source: InputSource,
    /// Loop the input forever (`-stream_loop -1`)
    pub looped: bool,
}

impl MediaInput {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: InputSource::File(path.into()),
            looped: false,
        }
    }

    #[must_use]
    pub fn lavfi(expr: impl Into<String>) -> Self {
        Self {
            source: InputSource::Lavfi(expr.into()),
            looped: false,
        }
    }

    #[must_use]
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    /// The file backing this input, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::File(p) => Some(p),
            InputSource::Lavfi(_) => None,
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodingProfile {
    pub video_codec: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u8>,
    pub pixel_format: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub strip_audio: bool,
    pub faststart: bool,
}

impl EncodingProfile {
    /// Silent H.264 intermediate used for normalised clips
    #[must_use]
    pub fn intermediate() -> Self {
        Self {
            video_codec: Some("libx264".to_string()),
            preset: Some("fast".to_string()),
            crf: Some(23),
            pixel_format: Some("yuv420p".to_string()),
            strip_audio: true,
            ..Default::default()
        }
    }

    /// 16-bit PCM WAV, 44.1 kHz stereo
    #[must_use]
    pub fn narration_wav() -> Self {
        Self {
            audio_codec: Some("pcm_s16le".to_string()),
            sample_rate: Some(44_100),
            channels: Some(2),
            ..Default::default()
        }
    }

    /// Final H.264/AAC MP4 laid out for progressive playback
    #[must_use]
    pub fn delivery() -> Self {
        Self {
            video_codec: Some("libx264".to_string()),
            preset: Some("medium".to_string()),
            crf: Some(23),
            pixel_format: Some("yuv420p".to_string()),
            audio_codec: Some("aac".to_string()),
            audio_bitrate: Some("192k".to_string()),
            faststart: true,
            ..Default::default()
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        let mut opt = |flag: &str, value: Option<String>| {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value);
            }
        };

        opt("-c:v", self.video_codec.clone());
        opt("-preset", self.preset.clone());
        opt("-crf", self.crf.map(|c| c.to_string()));
        opt("-pix_fmt", self.pixel_format.clone());
        opt("-c:a", self.audio_codec.clone());
        opt("-b:a", self.audio_bitrate.clone());
        opt("-ar", self.sample_rate.map(|r| r.to_string()));
        opt("-ac", self.channels.map(|c| c.to_string()));

        if self.strip_audio {
            args.push("-an".to_string());
        }
        if self.faststart {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
    }
}

/// One transcoder invocation: inputs, a filter graph, mapped pads, output.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub inputs: Vec<MediaInput>,
    pub graph: FilterGraph,
    /// Pads or streams to write (`"[v]"`, `"0:a"`)
    pub maps: Vec<String>,
    pub profile: EncodingProfile,
    /// Hard output length in seconds
    pub duration: Option<f64>,
    pub output: PathBuf,
}

impl TranscodeRequest {
    #[must_use]
    pub fn new(output: impl Into<PathBuf>, profile: EncodingProfile) -> Self {
        Self {
            inputs: Vec::new(),
            graph: FilterGraph::new(),
            maps: Vec::new(),
            profile,
            duration: None,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn input(mut self, input: MediaInput) -> Self {
        self.inputs.push(input);
        self
    }

    #[must_use]
    pub fn graph(mut self, graph: FilterGraph) -> Self {
        self.graph = graph;
        self
    }

    #[must_use]
    pub fn map(mut self, pad: impl Into<String>) -> Self {
        self.maps.push(pad.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Build the ffmpeg argument vector.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        for input in &self.inputs {
            if input.looped {
                args.push("-stream_loop".to_string());
                args.push("-1".to_string());
            }
            match &input.source {
                InputSource::File(path) => {
                    args.push("-i".to_string());
                    args.push(path.to_string_lossy().to_string());
                }
                InputSource::Lavfi(expr) => {
                    args.push("-f".to_string());
                    args.push("lavfi".to_string());
                    args.push("-i".to_string());
                    args.push(expr.clone());
                }
            }
        }

        if !self.graph.is_empty() {
            args.push("-filter_complex".to_string());
            args.push(self.graph.to_string());
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        self.profile.push_args(&mut args);

        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format!("{duration:.3}"));
        }

        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runs transcoder invocations.
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one invocation to completion.
    async fn run(&self, request: &TranscodeRequest) -> Result<(), ToolInvocationError>;
}

/// Keep the tail of a long diagnostic; ffmpeg prints the cause last.
fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// ffmpeg subprocess transcoder.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(crate::config::find_binary("ffmpeg"))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn run(&self, request: &TranscodeRequest) -> Result<(), ToolInvocationError> {
        let args = request.to_args();
        debug!("ffmpeg args: {:?}", args);

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolInvocationError::new("ffmpeg", None, format!("failed to spawn {}: {e}", self.ffmpeg_path)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("ffmpeg: {}", stderr.trim());
        }

        if !output.status.success() {
            return Err(ToolInvocationError::new(
                "ffmpeg",
                output.status.code(),
                tail(&stderr, 2000),
            ));
        }

        info!("Wrote {}", request.output.display());
        Ok(())
    }
}
