//! Job records and their lifecycle
//!
//! A job moves `queued -> processing -> completed | failed`. Transitions are
//! checked on every store update, so a terminal job can never be reopened.

pub mod orchestrator;
pub mod store;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use orchestrator::{Orchestrator, SubmitOptions};
pub use store::{FileJobStore, JobStore, MemoryJobStore, MemoryScripts, Script, ScriptProvider};

use crate::speech::VoiceConfig;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns `true` for `completed` and `failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal single step.
    ///
    /// Rewriting the same status is allowed so partial updates can carry it.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (a, b) if a == b => !a.is_terminal(),
            (Self::Queued, Self::Processing)
            | (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One video generation request and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub script_id: Option<String>,
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub duration: Option<f64>,
    pub error: Option<String>,
    /// Fallbacks taken while producing the output
    #[serde(default)]
    pub degraded: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            script_id: None,
            video_path: None,
            audio_path: None,
            duration: None,
            error: None,
            degraded: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create a queued job with a fresh random id.
    #[must_use]
    pub fn with_random_id() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn for_script(mut self, script_id: impl Into<String>) -> Self {
        self.script_id = Some(script_id.into());
        self
    }

    /// Apply a partial update in place. Status legality is checked by the store.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
            if status.is_terminal() {
                self.completed_at = Some(Utc::now());
            }
        }
        if let Some(path) = update.video_path {
            self.video_path = Some(path);
        }
        if let Some(path) = update.audio_path {
            self.audio_path = Some(path);
        }
        if let Some(duration) = update.duration {
            self.duration = Some(duration);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.degraded.extend(update.degraded);
    }
}

/// Partial set of job fields to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub duration: Option<f64>,
    pub error: Option<String>,
    pub degraded: Vec<String>,
}

impl JobUpdate {
    #[must_use]
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Everything the pipeline needs to produce one video.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub script: String,
    pub topic: String,
    pub voice: VoiceConfig,
    /// Background music file, mixed under the narration
    pub music: Option<PathBuf>,
    /// Explicit footage search query
    pub footage_query: Option<String>,
}
