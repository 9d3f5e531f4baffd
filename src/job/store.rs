//! Job persistence and script lookup ports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{Job, JobUpdate};
use crate::error::JobError;

/// Keyed job persistence with partial updates.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> Result<(), JobError>;

    /// Apply `update` to the stored job and return the new record.
    ///
    /// Fails with [`JobError::IllegalTransition`] if the status change would
    /// move the job backwards or out of a terminal state.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, JobError>;
}

fn check_transition(job: &Job, update: &JobUpdate) -> Result<(), JobError> {
    if let Some(next) = update.status {
        if !job.status.can_transition_to(next) {
            return Err(JobError::IllegalTransition {
                id: job.id.clone(),
                from: job.status,
                to: next,
            });
        }
    } else if job.status.is_terminal() {
        return Err(JobError::IllegalTransition {
            id: job.id.clone(),
            from: job.status,
            to: job.status,
        });
    }
    Ok(())
}

/// In-process job store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        check_transition(job, &update)?;
        job.apply(update);
        Ok(job.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }
}

/// One pretty-printed JSON file per job.
pub struct FileJobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// Store jobs under `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, JobError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| store_err(&dir, &e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let safe: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    async fn read(&self, id: &str) -> Result<Option<Job>, JobError> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| JobError::Store(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(&path, &e)),
        }
    }

    async fn write(&self, job: &Job) -> Result<(), JobError> {
        let path = self.path_for(&job.id);
        let json = serde_json::to_string_pretty(job)
            .map_err(|e| JobError::Store(format!("{}: {e}", path.display())))?;

        // Write-then-rename so readers never see a half-written record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| store_err(&tmp, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| store_err(&path, &e))?;
        debug!(job_id = %job.id, status = %job.status, "Persisted job");
        Ok(())
    }
}

fn store_err(path: &Path, e: &std::io::Error) -> JobError {
    JobError::Store(format!("{}: {e}", path.display()))
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, job: Job) -> Result<(), JobError> {
        let _guard = self.write_lock.lock().await;
        if self.read(&job.id).await?.is_some() {
            return Err(JobError::AlreadyExists(job.id));
        }
        self.write(&job).await
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobError> {
        let _guard = self.write_lock.lock().await;
        let mut job = self
            .read(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        check_transition(&job, &update)?;
        job.apply(update);
        self.write(&job).await?;
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        self.read(id).await
    }
}

/// Script text and topic, read by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub text: String,
    pub topic: String,
}

/// Read-only access to stored scripts.
#[async_trait]
pub trait ScriptProvider: Send + Sync {
    async fn read(&self, script_id: &str) -> Option<Script>;
}

/// Script provider backed by a map.
#[derive(Default)]
pub struct MemoryScripts {
    scripts: RwLock<HashMap<String, Script>>,
}

impl MemoryScripts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: impl Into<String>, text: impl Into<String>, topic: impl Into<String>) {
        self.scripts.write().await.insert(
            id.into(),
            Script {
                text: text.into(),
                topic: topic.into(),
            },
        );
    }
}

#[async_trait]
impl ScriptProvider for MemoryScripts {
    async fn read(&self, script_id: &str) -> Option<Script> {
        self.scripts.read().await.get(script_id).cloned()
    }
}
