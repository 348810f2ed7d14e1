use facepipe_core::{GalleryError, MatchError};
use facepipe_io::{ExtractError, InvokeError, StorageError};
use thiserror::Error;

use crate::engine::EngineError;

/// Fault that aborts a stage invocation.
///
/// Every variant is reported to the platform as a 500 result whose body is
/// the display text, naming the step that failed and its cause.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("failed to prepare working directory: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to download {bucket}/{key}: {source}")]
    Acquisition {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("error during frame extraction: {0}")]
    Extraction(#[from] ExtractError),
    #[error("failed to upload {bucket}/{key}: {source}")]
    Persistence {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to hand off to {function}: {source}")]
    Handoff {
        function: String,
        #[source]
        source: InvokeError,
    },
    #[error("face analysis failed: {0}")]
    Analysis(#[from] EngineError),
    #[error("gallery unavailable: {0}")]
    Gallery(#[from] GalleryError),
    #[error("matching failed: {0}")]
    Match(#[from] MatchError),
    #[error("failed to write result file: {0}")]
    ResultFile(#[source] std::io::Error),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl StageError {
    /// Short name of the failed step, for log fields.
    pub fn step(&self) -> &'static str {
        match self {
            StageError::InvalidEvent(_) => "parse",
            StageError::Workspace(_) => "workspace",
            StageError::Acquisition { .. } => "acquire",
            StageError::Extraction(_) | StageError::Analysis(_) => "process",
            StageError::Gallery(_) | StageError::Match(_) => "match",
            StageError::Persistence { .. } | StageError::ResultFile(_) => "persist",
            StageError::Handoff { .. } => "handoff",
            StageError::Unexpected(_) => "unexpected",
        }
    }
}
