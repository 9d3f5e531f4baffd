//! Media tool ports: filter graphs, the transcoder and the duration probe
//!
//! Everything that shells out to ffmpeg or ffprobe goes through the
//! [`Transcoder`] and [`MediaProbe`] traits so the pipeline can run against
//! fakes in tests.

pub mod filter;
pub mod probe;
pub mod transcoder;

pub use filter::{atempo_chain, escape_filter_path, FilterChain, FilterGraph};
pub use probe::{FfprobeProbe, MediaProbe};
pub use transcoder::{
    EncodingProfile, FfmpegTranscoder, InputSource, MediaInput, TranscodeRequest, Transcoder,
};
