//! Representative-frame extraction through an external `ffmpeg` binary.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Lines of tool stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 3;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("no frame written to {0}")]
    NoOutput(PathBuf),
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Write one still frame of the video at `input` to the image file `output`.
    async fn extract_frame(&self, input: &Path, output: &Path) -> Result<(), ExtractError>;
}

/// Runs `ffmpeg -i IN -vframes 1 -vf scale=W:H OUT -y`.
///
/// ffmpeg picks the frame (the first decodable one) and infers the image
/// format from the output extension.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
    width: u32,
    height: u32,
}

impl FfmpegExtractor {
    pub fn new(program: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            program: program.into(),
            width,
            height,
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.into(),
            "-vframes".into(),
            "1".into(),
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height).into(),
            output.into(),
            "-y".into(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract_frame(&self, input: &Path, output: &Path) -> Result<(), ExtractError> {
        let program = self.program.display().to_string();

        let result = Command::new(&self.program)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ");
            return Err(ExtractError::Failed {
                program,
                status: result.status.to_string(),
                stderr: tail,
            });
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(ExtractError::NoOutput(output.to_path_buf()));
        }

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            width = self.width,
            height = self.height,
            "extracted frame"
        );
        Ok(())
    }
}
