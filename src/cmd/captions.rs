use std::path::Path;

use anyhow::{bail, Context, Result};

use reelsmith::{AssWriter, Config, SubtitleCompiler, WordTiming};

pub async fn cmd_captions(
    config: &Config,
    timings_path: &Path,
    script_path: &Path,
    duration: Option<f64>,
    output: &Path,
) -> Result<()> {
    if let Some(d) = duration {
        if !d.is_finite() || d < 0.0 {
            bail!("--duration must be a non-negative number of seconds, got {d}");
        }
    }

    let raw = tokio::fs::read_to_string(timings_path)
        .await
        .with_context(|| format!("failed to read {}", timings_path.display()))?;
    let timings: Vec<WordTiming> =
        serde_json::from_str(&raw).with_context(|| format!("invalid timings in {}", timings_path.display()))?;
    let script = tokio::fs::read_to_string(script_path)
        .await
        .with_context(|| format!("failed to read {}", script_path.display()))?;

    let duration = duration
        .or_else(|| timings.iter().map(|t| t.end).reduce(f64::max))
        .map_or(0.0, reelsmith::timing::track_duration);

    let track = SubtitleCompiler::new(config.captions.group_size).compile(&timings, &script, duration);
    AssWriter::new(&config.canvas, &config.captions)
        .write_to_file(&track, output)
        .await?;

    println!(
        "💬 Wrote {} caption events ({duration:.2}s) to {}",
        track.events.len(),
        output.display()
    );
    Ok(())
}
