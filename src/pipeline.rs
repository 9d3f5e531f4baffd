//! Stage sequencing for one video
//!
//! Speech synthesis, then timestamp resolution, then footage acquisition and
//! caption compilation side by side, then assembly. Every artifact of a job
//! lands in `<output dir>/<job id>/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::assembler::{AssemblyInput, MediaAssembler};
use crate::captions::{AssWriter, SubtitleCompiler};
use crate::config::{Config, TranscriptionBackend};
use crate::error::{ProviderError, Result};
use crate::footage::{FootageProvider, FootageStage, PexelsProvider};
use crate::job::GenerationRequest;
use crate::media::{FfmpegTranscoder, FfprobeProbe, MediaProbe, Transcoder};
use crate::speech::{ElevenLabsProvider, SpeechProvider, SpeechStage};
use crate::timestamps::{OpenAiTranscriber, TimestampResolver, TranscriptionProvider, WhisperCli};
use crate::timing::WordTiming;

pub const DEGRADED_FALLBACK_VOICE: &str = "fallback voice";
pub const DEGRADED_UNIFORM_TIMING: &str = "uniform timing";
pub const DEGRADED_SOLID_BACKGROUND: &str = "solid background";

/// External collaborators the pipeline talks to.
pub struct Ports {
    pub speech: Arc<dyn SpeechProvider>,
    /// Tried in order after provider-native timing
    pub transcribers: Vec<Arc<dyn TranscriptionProvider>>,
    pub footage: Arc<dyn FootageProvider>,
    pub transcoder: Arc<dyn Transcoder>,
    pub probe: Arc<dyn MediaProbe>,
}

impl Ports {
    /// Real providers as described by `config`.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ProviderError> {
        let mut transcribers: Vec<Arc<dyn TranscriptionProvider>> = Vec::new();
        for backend in &config.transcription.backends {
            match backend {
                TranscriptionBackend::Openai => {
                    transcribers.push(Arc::new(OpenAiTranscriber::new(&config.transcription)?));
                }
                TranscriptionBackend::WhisperCli => {
                    transcribers.push(Arc::new(WhisperCli::new(&config.transcription)));
                }
            }
        }

        Ok(Self {
            speech: Arc::new(ElevenLabsProvider::new(&config.speech)?),
            transcribers,
            footage: Arc::new(PexelsProvider::new(&config.footage)?),
            transcoder: Arc::new(FfmpegTranscoder::new(&config.tools.ffmpeg_path)),
            probe: Arc::new(FfprobeProbe::new(&config.tools.ffprobe_path)),
        })
    }
}

/// Intermediate artifacts of one running job. Never shared between jobs.
#[derive(Debug)]
pub struct PipelineContext {
    pub job_id: String,
    pub work_dir: PathBuf,
    pub audio_path: PathBuf,
    /// Narration length, after any tempo change
    pub duration: f64,
    pub timings: Vec<WordTiming>,
    pub clips: Vec<PathBuf>,
    pub captions_path: PathBuf,
    pub degraded: Vec<String>,
}

impl PipelineContext {
    fn new(job_id: &str, output_dir: &Path) -> Self {
        let work_dir = output_dir.join(job_id);
        Self {
            job_id: job_id.to_string(),
            captions_path: work_dir.join("captions.ass"),
            audio_path: work_dir.join("narration.wav"),
            work_dir,
            duration: 0.0,
            timings: Vec::new(),
            clips: Vec::new(),
            degraded: Vec::new(),
        }
    }

    fn degrade(&mut self, note: &str) {
        warn!(job_id = %self.job_id, "Degraded: {note}");
        self.degraded.push(note.to_string());
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub duration: f64,
    /// Fallbacks taken along the way
    pub degraded: Vec<String>,
}

pub struct Pipeline {
    speech: SpeechStage,
    timestamps: TimestampResolver,
    footage: FootageStage,
    compiler: SubtitleCompiler,
    writer: AssWriter,
    assembler: MediaAssembler,
    output_dir: PathBuf,
}

impl Pipeline {
    /// Pipeline with the real providers.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ProviderError> {
        Ok(Self::with_ports(config, Ports::from_config(config)?))
    }

    pub fn with_ports(config: &Config, ports: Ports) -> Self {
        let speech = SpeechStage::new(
            ports.speech,
            Arc::clone(&ports.transcoder),
            ports.probe,
            &config.speech.voice_id,
            &config.speech.fallback_voice_id,
        )
        .with_silent_secs(config.speech.silent_narration_secs);

        Self {
            speech,
            timestamps: TimestampResolver::new(ports.transcribers),
            footage: FootageStage::new(ports.footage, config.footage.clone(), config.canvas),
            compiler: SubtitleCompiler::new(config.captions.group_size),
            writer: AssWriter::new(&config.canvas, &config.captions),
            assembler: MediaAssembler::new(
                ports.transcoder,
                config.canvas,
                config.audio,
                config.footage.unit_clip_secs,
            ),
            output_dir: config.output.dir.clone(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the finished video of `job_id` is written.
    #[must_use]
    pub fn final_output(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id).join("final.mp4")
    }

    /// Remove whatever a failed or abandoned run left at the final output.
    pub async fn discard_output(&self, job_id: &str) {
        let output = self.final_output(job_id);
        match tokio::fs::remove_file(&output).await {
            Ok(()) => debug!(job_id, path = %output.display(), "Removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id, path = %output.display(), "Could not remove partial output: {e}"),
        }
    }

    /// Run every stage for `job_id`.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub async fn run(&self, job_id: &str, request: &GenerationRequest) -> Result<PipelineOutcome> {
        let mut ctx = PipelineContext::new(job_id, &self.output_dir);
        tokio::fs::create_dir_all(&ctx.work_dir).await?;

        let narration = self.speech.run(&request.script, &request.voice, &ctx.work_dir).await?;
        if narration.used_fallback_voice {
            ctx.degrade(DEGRADED_FALLBACK_VOICE);
        }
        ctx.audio_path.clone_from(&narration.audio_path);
        ctx.duration = narration.duration;

        let resolved = self.timestamps.resolve(&request.script, &narration).await;
        if resolved.is_uniform() {
            ctx.degrade(DEGRADED_UNIFORM_TIMING);
        }
        ctx.timings = resolved.timings;

        let track = self.compiler.compile(&ctx.timings, &request.script, ctx.duration);
        let (selection, written) = tokio::join!(
            self.footage.run(ctx.duration, request.footage_query.as_deref(), &ctx.work_dir),
            self.writer.write_to_file(&track, &ctx.captions_path),
        );
        written?;
        info!(job_id, query = %selection.query, clips = selection.clips.len(), events = track.events.len(), "Footage and captions ready");

        ctx.clips = selection.clips;
        if ctx.clips.is_empty() {
            ctx.degrade(DEGRADED_SOLID_BACKGROUND);
        }

        self.assemble(ctx, request).await
    }

    async fn assemble(&self, ctx: PipelineContext, request: &GenerationRequest) -> Result<PipelineOutcome> {
        let output = self.final_output(&ctx.job_id);

        let input = AssemblyInput {
            narration: &ctx.audio_path,
            duration: ctx.duration,
            clips: &ctx.clips,
            captions: &ctx.captions_path,
            music: request.music.as_deref(),
            work_dir: &ctx.work_dir,
            output: &output,
        };

        let video_path = match self.assembler.assemble(&input).await {
            Ok(path) => path,
            Err(e) => {
                self.discard_output(&ctx.job_id).await;
                return Err(e);
            }
        };

        Ok(PipelineOutcome {
            video_path,
            audio_path: ctx.audio_path,
            duration: ctx.duration,
            degraded: ctx.degraded,
        })
    }
}
