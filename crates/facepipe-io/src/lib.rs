//! facepipe-io — The pipeline's external collaborators.
//!
//! Object storage (S3 or a local directory), fire-and-forget function
//! invocation (Lambda or an in-process queue), single-frame extraction via
//! ffmpeg, and the per-invocation scratch directory.

pub mod ffmpeg;
pub mod invoke;
pub mod storage;
pub mod workdir;

pub use ffmpeg::{ExtractError, FfmpegExtractor, FrameExtractor};
pub use invoke::{ChannelInvoker, Invocation, InvokeError, Invoker, LambdaInvoker};
pub use storage::{FsStore, ObjectStore, S3Store, StorageError};
pub use workdir::WorkDir;

/// Load the shared AWS SDK configuration from the environment.
pub async fn aws_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}
