use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("ffprobe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),
    #[error("container reports no duration")]
    NoDuration,
}

impl From<ProbeError> for AppError {
    fn from(err: ProbeError) -> Self {
        AppError::ProbeFailed(err.to_string())
    }
}

/// Reads the playback duration of a media file on local disk.
#[async_trait]
pub trait DurationProber: Send + Sync {
    /// Duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Extract `format.duration` from `ffprobe -print_format json -show_format` output.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<f64, ProbeError> {
    let output: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;

    output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or(ProbeError::NoDuration)
}

/// Prober backed by the `ffprobe` binary.
pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: String) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl DurationProber for FfprobeProber {
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    async fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let duration = parse_ffprobe_output(&output.stdout)?;
        tracing::debug!(duration, "Probed media duration");
        Ok(duration)
    }
}
