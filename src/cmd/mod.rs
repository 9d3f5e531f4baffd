pub mod captions;
pub mod check;
pub mod generate;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;

use reelsmith::{Config, FileJobStore, Job, JobStatus};

/// Where the CLI keeps job records
pub fn job_dir(config: &Config) -> PathBuf {
    config.output.dir.join("jobs")
}

pub fn open_store(config: &Config) -> Result<FileJobStore> {
    Ok(FileJobStore::new(job_dir(config))?)
}

pub fn print_job(job: &Job, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    let icon = match job.status {
        JobStatus::Queued => "⏳",
        JobStatus::Processing => "⚙️ ",
        JobStatus::Completed => "✅",
        JobStatus::Failed => "❌",
    };
    println!("{icon} Job {}: {}", job.id, job.status);
    if let Some(script_id) = &job.script_id {
        println!("   Script: {script_id}");
    }
    if let Some(video) = &job.video_path {
        println!("   Video: {}", video.display());
    }
    if let Some(audio) = &job.audio_path {
        println!("   Audio: {}", audio.display());
    }
    if let Some(duration) = job.duration {
        println!("   Duration: {duration:.2}s");
    }
    if !job.degraded.is_empty() {
        println!("   Degraded: {}", job.degraded.join(", "));
    }
    if let Some(error) = &job.error {
        println!("   Error: {error}");
    }
    println!("   Created: {}", job.created_at.to_rfc3339());
    if let Some(done) = job.completed_at {
        let secs = (done - job.created_at).num_milliseconds() as f64 / 1000.0;
        println!("   Finished: {} ({secs:.1}s)", done.to_rfc3339());
    }
    Ok(())
}
