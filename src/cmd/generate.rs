use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use reelsmith::{
    Config, GenerationRequest, Job, JobStatus, JobStore, MemoryScripts, Orchestrator, Pipeline, VoiceConfig,
};

use super::{open_store, print_job};
use crate::GenerateArgs;

pub async fn cmd_generate(config: &Config, args: GenerateArgs) -> Result<()> {
    let script = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("failed to read script {}", args.script.display()))?;

    if let Some(music) = &args.music {
        if !music.exists() {
            bail!("music file not found: {}", music.display());
        }
    }

    let pipeline = Pipeline::from_config(config).context("failed to set up providers")?;
    let store: Arc<dyn JobStore> = Arc::new(open_store(config)?);
    let orchestrator = Orchestrator::new(store, Arc::new(MemoryScripts::new()), Arc::new(pipeline))
        .with_deadline(config.job.deadline_secs.map(Duration::from_secs));

    let job = args.job_id.map_or_else(Job::with_random_id, Job::new);
    let job_id = job.id.clone();
    orchestrator.store().create(job).await?;

    let request = GenerationRequest {
        script,
        topic: args.topic,
        voice: VoiceConfig {
            stability: args.stability,
            similarity: args.similarity,
            style: args.style,
            speaker_boost: !args.no_speaker_boost,
            speed: args.speed,
        },
        music: args.music,
        footage_query: args.query,
    };

    eprintln!("🎬 Generating job {job_id}");
    orchestrator.start(&job_id, request).await?;
    let job = orchestrator.wait(&job_id).await?;

    print_job(&job, args.json)?;
    if job.status == JobStatus::Failed {
        bail!("job {job_id} failed");
    }
    Ok(())
}
