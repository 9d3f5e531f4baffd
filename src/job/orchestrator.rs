//! Job lifecycle: the only writer of job status.
//!
//! `start` marks a job processing, spawns the pipeline and returns. The
//! spawned task stays registered in the active table until its completion
//! hook has written the terminal status, so an in-flight job is never
//! dropped on the floor.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn, Instrument};

use super::store::{JobStore, ScriptProvider};
use super::{GenerationRequest, Job, JobStatus, JobUpdate};
use crate::error::{JobError, PipelineError};
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::speech::VoiceConfig;

struct ActiveJob {
    handle: JoinHandle<()>,
    done: watch::Receiver<Option<JobStatus>>,
}

type ActiveTable = Arc<Mutex<HashMap<String, ActiveJob>>>;

/// Options for [`Orchestrator::submit`]; the script text comes from the
/// script provider.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub voice: VoiceConfig,
    pub music: Option<PathBuf>,
    pub footage_query: Option<String>,
}

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    scripts: Arc<dyn ScriptProvider>,
    pipeline: Arc<Pipeline>,
    active: ActiveTable,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, scripts: Arc<dyn ScriptProvider>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            store,
            scripts,
            pipeline,
            active: Arc::new(Mutex::new(HashMap::new())),
            deadline: None,
        }
    }

    /// Fail any job still running after `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Begin generating `job_id` in the background.
    ///
    /// The job must already exist in the store. Returns once the job is
    /// marked processing; the pipeline runs on its own task.
    pub async fn start(&self, job_id: &str, request: GenerationRequest) -> Result<(), JobError> {
        // Held across spawn and insert so the completion hook cannot run first
        let mut active = self.active.lock().await;
        if active.contains_key(job_id) {
            return Err(JobError::AlreadyRunning(job_id.to_string()));
        }

        self.store
            .update(job_id, JobUpdate::status(JobStatus::Processing))
            .await?;

        let (done_tx, done_rx) = watch::channel(None);
        let task = JobTask {
            job_id: job_id.to_string(),
            store: Arc::clone(&self.store),
            pipeline: Arc::clone(&self.pipeline),
            active: Arc::clone(&self.active),
            deadline: self.deadline,
            done: done_tx,
        };

        let span = tracing::info_span!("job", job_id = %job_id);
        let handle = tokio::spawn(task.run(request).instrument(span));
        active.insert(
            job_id.to_string(),
            ActiveJob {
                handle,
                done: done_rx,
            },
        );

        info!(job_id, "Job started");
        Ok(())
    }

    /// Create a queued job for a stored script and start it.
    #[instrument(skip(self, options))]
    pub async fn submit(&self, script_id: &str, options: SubmitOptions) -> Result<Job, JobError> {
        let script = self
            .scripts
            .read(script_id)
            .await
            .ok_or_else(|| JobError::ScriptNotFound(script_id.to_string()))?;

        let job = Job::with_random_id().for_script(script_id);
        self.store.create(job.clone()).await?;

        let request = GenerationRequest {
            script: script.text,
            topic: script.topic,
            voice: options.voice,
            music: options.music,
            footage_query: options.footage_query,
        };
        self.start(&job.id, request).await?;

        Ok(self.store.get(&job.id).await?.unwrap_or(job))
    }

    /// Whether `job_id` has a task in flight.
    pub async fn is_running(&self, job_id: &str) -> bool {
        self.active.lock().await.contains_key(job_id)
    }

    pub async fn running_jobs(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Wait for `job_id` to reach a terminal status and return its record.
    pub async fn wait(&self, job_id: &str) -> Result<Job, JobError> {
        let receiver = self
            .active
            .lock()
            .await
            .get(job_id)
            .map(|job| job.done.clone());

        if let Some(mut receiver) = receiver {
            // A closed channel means the hook already ran; the store has the answer
            let _ = receiver.wait_for(Option::is_some).await;
        }

        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Abort every in-flight task. Used on shutdown only; jobs are not
    /// cancellable individually.
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        for (job_id, job) in active.drain() {
            warn!(job_id = %job_id, "Aborting job on shutdown");
            job.handle.abort();
        }
    }
}

/// State moved into a spawned job task.
struct JobTask {
    job_id: String,
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    active: ActiveTable,
    deadline: Option<Duration>,
    done: watch::Sender<Option<JobStatus>>,
}

impl JobTask {
    async fn run(self, request: GenerationRequest) {
        let result = self.execute(&request).await;
        self.finalize(result).await;
    }

    /// Run the pipeline, turning panics and a blown deadline into errors.
    async fn execute(&self, request: &GenerationRequest) -> Result<PipelineOutcome, PipelineError> {
        let run = AssertUnwindSafe(self.pipeline.run(&self.job_id, request)).catch_unwind();

        let caught = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| PipelineError::DeadlineExceeded(limit.as_secs()))?,
            None => run.await,
        };

        caught.map_err(|panic| PipelineError::Panicked(panic_message(panic.as_ref())))?
    }

    /// Completion hook: write the terminal status, wake waiters, deregister.
    async fn finalize(self, result: Result<PipelineOutcome, PipelineError>) {
        let update = match result {
            Ok(outcome) => {
                info!(video = %outcome.video_path.display(), duration = outcome.duration, "Job completed");
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    video_path: Some(outcome.video_path),
                    audio_path: Some(outcome.audio_path),
                    duration: Some(outcome.duration),
                    error: None,
                    degraded: outcome.degraded,
                }
            }
            Err(e) => {
                error!("Job failed: {e}");
                // A panic or blown deadline skips the pipeline's own cleanup
                self.pipeline.discard_output(&self.job_id).await;
                JobUpdate::failed(e.to_string())
            }
        };

        let mut status = update.status.unwrap_or(JobStatus::Failed);
        if let Err(e) = self.store.update(&self.job_id, update).await {
            error!("Could not record final status: {e}");
            status = JobStatus::Failed;
            if let Err(e) = self.store.update(&self.job_id, JobUpdate::failed(e.to_string())).await {
                error!("Could not record failure either: {e}");
            }
        }

        self.done.send_replace(Some(status));
        self.active.lock().await.remove(&self.job_id);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(boxed.as_ref()), "owned boom");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
