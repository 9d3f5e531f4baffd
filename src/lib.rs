//! `reelsmith` - script to vertical video
//!
//! # Pipeline
//!
//! - **Speech**: narration through a TTS provider, with one retry on a
//!   fallback voice and tempo adjustment
//! - **Timestamps**: provider alignment, then transcription, then an even
//!   split of the narration
//! - **Footage**: scored stock clip search with bounded parallel downloads
//! - **Captions**: word-highlight karaoke captions rendered as ASS
//! - **Assembly**: ffmpeg filter graphs for the footage track, burned-in
//!   captions and a ducked music bed
//!
//! Jobs run in the background under an [`Orchestrator`], which owns their
//! status from `processing` to `completed` or `failed`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelsmith::{Config, GenerationRequest, Job, MemoryJobStore, MemoryScripts, Orchestrator, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let pipeline = Arc::new(Pipeline::from_config(&config)?);
//!     let store = Arc::new(MemoryJobStore::new());
//!     let orchestrator = Orchestrator::new(store.clone(), Arc::new(MemoryScripts::new()), pipeline);
//!
//!     let job = Job::with_random_id();
//!     reelsmith::JobStore::create(store.as_ref(), job.clone()).await?;
//!     orchestrator
//!         .start(&job.id, GenerationRequest { script: "Hello there".into(), ..Default::default() })
//!         .await?;
//!     let done = orchestrator.wait(&job.id).await?;
//!     println!("{}: {:?}", done.status, done.video_path);
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod captions;
pub mod config;
pub mod error;
pub mod footage;
pub mod http_client;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod speech;
pub mod timestamps;
pub mod timing;

pub use assembler::{AssemblyInput, Background, MediaAssembler};
pub use captions::{AssWriter, CaptionTrack, SubtitleCompiler};
pub use config::Config;
pub use error::{DownloadError, JobError, PipelineError, ProviderError, ToolInvocationError, ValidationError};
pub use footage::{FootageCandidate, FootageProvider, FootageStage, Orientation, PexelsProvider};
pub use job::{
    FileJobStore, GenerationRequest, Job, JobStatus, JobStore, JobUpdate, MemoryJobStore, MemoryScripts, Orchestrator,
    Script, ScriptProvider, SubmitOptions,
};
pub use media::{FfmpegTranscoder, FfprobeProbe, MediaProbe, TranscodeRequest, Transcoder};
pub use pipeline::{Pipeline, PipelineContext, PipelineOutcome, Ports};
pub use speech::{ElevenLabsProvider, Narration, SpeechProvider, SpeechStage, Synthesis, VoiceConfig};
pub use timestamps::{OpenAiTranscriber, ResolvedTimings, TimestampResolver, TranscriptionProvider, WhisperCli};
pub use timing::{CaptionEvent, WordTiming};

/// Version of reelsmith
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
