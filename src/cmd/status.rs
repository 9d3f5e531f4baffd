use anyhow::{bail, Result};

use reelsmith::{Config, JobStore};

use super::{open_store, print_job};

pub async fn cmd_status(config: &Config, job_id: &str, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let Some(job) = store.get(job_id).await? else {
        bail!("job {job_id} not found");
    };
    print_job(&job, json)
}
