//! Final video assembly
//!
//! 1. Each downloaded clip is scaled and cropped to the canvas, stripped of
//!    audio and cut to the unit clip length.
//! 2. The normalised clips are cycled and concatenated into a footage track
//!    exactly as long as the narration. Without clips a solid colour source
//!    of the same length stands in.
//! 3. One last invocation burns in the captions, mixes narration with the
//!    optional music bed and writes a fast-start MP4.
//!
//! Every transcoder failure aborts assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::{AudioConfig, CanvasConfig};
use crate::error::Result;
use crate::media::{
    escape_filter_path, EncodingProfile, FilterChain, FilterGraph, MediaInput, TranscodeRequest, Transcoder,
};

/// What sits behind the captions.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Pre-built footage track
    Footage(PathBuf),
    /// Solid colour, generated in the final pass
    Solid,
}

/// Artifacts the assembler combines.
#[derive(Debug, Clone)]
pub struct AssemblyInput<'a> {
    pub narration: &'a Path,
    /// Narration length; governs the output length
    pub duration: f64,
    pub clips: &'a [PathBuf],
    pub captions: &'a Path,
    pub music: Option<&'a Path>,
    pub work_dir: &'a Path,
    pub output: &'a Path,
}

pub struct MediaAssembler {
    transcoder: Arc<dyn Transcoder>,
    canvas: CanvasConfig,
    audio: AudioConfig,
    unit_clip_secs: f64,
    background_color: String,
}

impl MediaAssembler {
    pub fn new(transcoder: Arc<dyn Transcoder>, canvas: CanvasConfig, audio: AudioConfig, unit_clip_secs: f64) -> Self {
        Self {
            transcoder,
            canvas,
            audio,
            unit_clip_secs: if unit_clip_secs > 0.0 { unit_clip_secs } else { 2.5 },
            background_color: "black".to_string(),
        }
    }

    /// Assemble the final video and return its path.
    #[instrument(skip(self, input), fields(clips = input.clips.len(), duration = input.duration))]
    pub async fn assemble(&self, input: &AssemblyInput<'_>) -> Result<PathBuf> {
        let mut normalized = Vec::with_capacity(input.clips.len());
        for (i, clip) in input.clips.iter().enumerate() {
            let out = input.work_dir.join(format!("norm_{i:02}.mp4"));
            self.transcoder.run(&self.normalize_request(clip, &out)).await?;
            normalized.push(out);
        }

        let background = if normalized.is_empty() {
            info!("No footage, using solid background");
            Background::Solid
        } else {
            let track = input.work_dir.join("footage.mp4");
            self.transcoder
                .run(&self.footage_request(&normalized, input.duration, &track))
                .await?;
            Background::Footage(track)
        };

        let request = self.final_request(input, &background);
        self.transcoder.run(&request).await?;

        info!(output = %input.output.display(), "Assembled video");
        Ok(input.output.to_path_buf())
    }

    fn canvas_filters(&self) -> [String; 4] {
        let (w, h) = (self.canvas.width, self.canvas.height);
        [
            format!("scale={w}:{h}:force_original_aspect_ratio=increase"),
            format!("crop={w}:{h}"),
            format!("fps={}", self.canvas.fps),
            "setsar=1".to_string(),
        ]
    }

    /// Scale/crop one clip to the canvas and cut it to the unit length.
    #[must_use]
    pub fn normalize_request(&self, clip: &Path, output: &Path) -> TranscodeRequest {
        let chain = self
            .canvas_filters()
            .into_iter()
            .fold(FilterChain::new(["0:v"]), |c, f| c.filter(f))
            .to("v");

        TranscodeRequest::new(output, EncodingProfile::intermediate())
            .input(MediaInput::file(clip))
            .graph(FilterGraph::new().chain(chain))
            .map("[v]")
            .duration(self.unit_clip_secs)
    }

    /// Number of unit clips needed to cover `duration`.
    #[must_use]
    pub fn segments_needed(&self, duration: f64) -> usize {
        ((duration.max(0.0) / self.unit_clip_secs).ceil() as usize).max(1)
    }

    /// Cycle normalised clips until `duration` is covered, then trim.
    #[must_use]
    pub fn footage_request(&self, normalized: &[PathBuf], duration: f64, output: &Path) -> TranscodeRequest {
        let count = self.segments_needed(duration);
        let mut request = TranscodeRequest::new(output, EncodingProfile::intermediate());
        for path in normalized.iter().cycle().take(count) {
            request = request.input(MediaInput::file(path));
        }

        let pads: Vec<String> = (0..count).map(|i| format!("{i}:v")).collect();
        let chain = FilterChain::new(pads)
            .filter(format!("concat=n={count}:v=1:a=0"))
            .filter(format!("trim=duration={duration:.3}"))
            .filter("setpts=PTS-STARTPTS")
            .to("v");
        debug!(segments = count, "Building footage track");

        request
            .graph(FilterGraph::new().chain(chain))
            .map("[v]")
            .duration(duration)
    }

    /// The single pass producing the delivered file.
    #[must_use]
    pub fn final_request(&self, input: &AssemblyInput<'_>, background: &Background) -> TranscodeRequest {
        let (w, h, fps) = (self.canvas.width, self.canvas.height, self.canvas.fps);
        let mut request = TranscodeRequest::new(input.output, EncodingProfile::delivery());
        let mut graph = FilterGraph::new();

        request = match background {
            Background::Footage(track) => request.input(MediaInput::file(track)),
            Background::Solid => request.input(MediaInput::lavfi(format!(
                "color=c={}:s={w}x{h}:r={fps}:d={:.3}",
                self.background_color, input.duration
            ))),
        };
        request = request.input(MediaInput::file(input.narration));

        graph.push(
            FilterChain::new(["0:v"])
                .filter(format!("ass={}", escape_filter_path(input.captions)))
                .to("v"),
        );

        let narration_level = format!("volume={}", self.audio.narration_volume);
        let audio_pad = if let Some(music) = input.music {
            request = request.input(MediaInput::file(music).looped());
            let music_level = format!("volume={}", self.audio.music_volume);

            if self.audio.duck {
                graph.push(
                    FilterChain::new(["1:a"])
                        .filter(narration_level)
                        .filter("asplit=2")
                        .to("voice")
                        .to("key"),
                );
                graph.push(FilterChain::new(["2:a"]).filter(music_level).to("bed"));
                graph.push(
                    FilterChain::new(["bed", "key"])
                        .filter("sidechaincompress=threshold=0.05:ratio=8:attack=20:release=300")
                        .to("ducked"),
                );
                graph.push(
                    FilterChain::new(["voice", "ducked"])
                        .filter("amix=inputs=2:duration=first:dropout_transition=2")
                        .to("a"),
                );
            } else {
                graph.push(FilterChain::new(["1:a"]).filter(narration_level).to("voice"));
                graph.push(FilterChain::new(["2:a"]).filter(music_level).to("bed"));
                graph.push(
                    FilterChain::new(["voice", "bed"])
                        .filter("amix=inputs=2:duration=first:dropout_transition=2")
                        .to("a"),
                );
            }
            "[a]".to_string()
        } else {
            "1:a".to_string()
        };

        request
            .graph(graph)
            .map("[v]")
            .map(audio_pad)
            .duration(input.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FfmpegTranscoder;

    fn assembler(duck: bool) -> MediaAssembler {
        MediaAssembler::new(
            Arc::new(FfmpegTranscoder::new("ffmpeg")),
            CanvasConfig::default(),
            AudioConfig {
                duck,
                ..Default::default()
            },
            2.5,
        )
    }

    fn input<'a>(music: Option<&'a Path>) -> AssemblyInput<'a> {
        AssemblyInput {
            narration: Path::new("/work/narration.wav"),
            duration: 7.2,
            clips: &[],
            captions: Path::new("/work/captions.ass"),
            music,
            work_dir: Path::new("/work"),
            output: Path::new("/work/final.mp4"),
        }
    }

    #[test]
    fn test_normalize_request() {
        let args = assembler(true)
            .normalize_request(Path::new("/work/clip_00.mp4"), Path::new("/work/norm_00.mp4"))
            .to_args()
            .join(" ");
        assert!(args.contains(
            "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,fps=30,setsar=1[v]"
        ));
        assert!(args.contains("-an"));
        assert!(args.contains("-t 2.500"));
    }

    #[test]
    fn test_footage_request_cycles_clips() {
        let clips = vec![PathBuf::from("/w/a.mp4"), PathBuf::from("/w/b.mp4")];
        let request = assembler(true).footage_request(&clips, 7.2, Path::new("/w/footage.mp4"));

        assert_eq!(request.inputs.len(), 3);
        assert_eq!(request.inputs[2].path(), Some(Path::new("/w/a.mp4")));
        let graph = request.graph.to_string();
        assert!(graph.starts_with("[0:v][1:v][2:v]concat=n=3:v=1:a=0,trim=duration=7.200"));
        assert_eq!(request.duration, Some(7.2));
    }

    #[test]
    fn test_segments_needed() {
        let a = assembler(true);
        assert_eq!(a.segments_needed(7.5), 3);
        assert_eq!(a.segments_needed(7.6), 4);
        assert_eq!(a.segments_needed(0.0), 1);
    }

    #[test]
    fn test_final_request_solid_background_without_music() {
        let input = input(None);
        let request = assembler(true).final_request(&input, &Background::Solid);
        let args = request.to_args().join(" ");

        assert!(args.contains("-f lavfi -i color=c=black:s=1080x1920:r=30:d=7.200"));
        assert!(args.contains("ass=/work/captions.ass"));
        assert!(args.contains("-map [v] -map 1:a"));
        assert!(args.contains("-movflags +faststart"));
        assert!(args.contains("-t 7.200"));
        assert!(!args.contains("amix"));
    }

    #[test]
    fn test_final_request_ducks_music() {
        let music = PathBuf::from("/music/bed.mp3");
        let input = input(Some(&music));
        let request = assembler(true).final_request(&input, &Background::Footage(PathBuf::from("/work/footage.mp4")));
        let graph = request.graph.to_string();

        assert!(graph.contains("[1:a]volume=1,asplit=2[voice][key]"));
        assert!(graph.contains("[2:a]volume=0.3[bed]"));
        assert!(graph.contains("[bed][key]sidechaincompress"));
        assert!(graph.contains("[voice][ducked]amix=inputs=2:duration=first:dropout_transition=2[a]"));
        assert!(request.inputs[2].looped);
        assert_eq!(request.maps, vec!["[v]", "[a]"]);
    }

    #[test]
    fn test_final_request_plain_mix() {
        let music = PathBuf::from("/music/bed.mp3");
        let input = input(Some(&music));
        let graph = assembler(false)
            .final_request(&input, &Background::Solid)
            .graph
            .to_string();
        assert!(graph.contains("[voice][bed]amix"));
        assert!(!graph.contains("sidechaincompress"));
    }
}
