//! Media duration measurement via ffprobe

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ToolInvocationError;

/// Measures media files.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Container duration in seconds.
    async fn duration(&self, path: &Path) -> Result<f64, ToolInvocationError>;
}

/// ffprobe subprocess probe.
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl FfprobeProbe {
    #[must_use]
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Check if ffprobe is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new(crate::config::find_binary("ffprobe"))
    }
}

/// Parse ffprobe's bare `format=duration` output.
pub(crate) fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64, ToolInvocationError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ToolInvocationError::new("ffprobe", None, format!("failed to spawn {}: {e}", self.ffprobe_path)))?;

        if !output.status.success() {
            return Err(ToolInvocationError::new(
                "ffprobe",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_duration(&stdout).ok_or_else(|| {
            ToolInvocationError::new(
                "ffprobe",
                output.status.code(),
                format!("no duration for {}: {:?}", path.display(), stdout.trim()),
            )
        })
    }
}
