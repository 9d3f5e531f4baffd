//! Error taxonomy for the generation pipeline
//!
//! Only [`ProviderError`] (after fallbacks are exhausted) and
//! [`ToolInvocationError`] end a job. Download and validation problems are
//! absorbed inside the stage that hit them.

use thiserror::Error;

/// External service failure (TTS, transcription, footage search).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider}: malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: not configured: {message}")]
    NotConfigured {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }

    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            message: message.into(),
        }
    }
}

/// Failure fetching a single footage asset.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("download of {url} was empty")]
    Empty { url: String },

    #[error("writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-zero exit (or spawn failure) of an external media tool.
#[derive(Error, Debug)]
#[error("{tool} failed (exit code {}): {diagnostic}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
pub struct ToolInvocationError {
    pub tool: String,
    pub exit_code: Option<i32>,
    pub diagnostic: String,
}

impl ToolInvocationError {
    pub fn new(tool: impl Into<String>, exit_code: Option<i32>, diagnostic: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Input that a stage can repair on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("timing sequence is empty")]
    EmptyTiming,

    #[error("word {index} has invalid window [{start}, {end})")]
    InvalidWindow { index: usize, start: f64, end: f64 },

    #[error("word {index} starts before its predecessor")]
    OutOfOrder { index: usize },
}

/// Fatal pipeline failure, recorded on the job as its error text.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("speech synthesis failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Tool(#[from] ToolInvocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("job exceeded its deadline of {0}s")]
    DeadlineExceeded(u64),

    #[error("pipeline task panicked: {0}")]
    Panicked(String),
}

/// Orchestrator and job store misuse.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} already exists")]
    AlreadyExists(String),

    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("script {0} not found")]
    ScriptNotFound(String),

    #[error("job {id}: illegal status transition {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: crate::job::JobStatus,
        to: crate::job::JobStatus,
    },

    #[error("job store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_message_includes_exit_code_and_diagnostic() {
        let err = ToolInvocationError::new("ffmpeg", Some(1), "Invalid data found");
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Invalid data found"));
    }

    #[test]
    fn test_tool_error_without_exit_code() {
        let err = ToolInvocationError::new("ffprobe", None, "killed by signal");
        assert!(err.to_string().contains("exit code none"));
    }

    #[test]
    fn test_provider_error_converts_into_pipeline_error() {
        let err: PipelineError = ProviderError::unavailable("elevenlabs", "voice missing").into();
        assert!(err.to_string().contains("elevenlabs: voice missing"));
    }
}
