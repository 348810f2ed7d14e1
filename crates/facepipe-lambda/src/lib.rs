//! facepipe stages — frame extraction and face recognition as serverless functions.
//!
//! Each stage is a plain struct over the storage, extraction, invocation and
//! analysis seams from `facepipe-io`, so the same handlers run under the
//! function runtime and from the local CLI.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod keys;
pub mod recognize;
pub mod split;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::StageError;
pub use event::{HandoffPayload, ObjectLocation, Response, StorageEvent};
pub use recognize::{FaceAnalyzer, FaceRecognition, Recognition, RecognizeSettings};
pub use split::{FrameSplitter, SplitSettings};

use tracing_subscriber::EnvFilter;

/// Log setup for function processes: the platform timestamps and colours
/// nothing, so both are left out. Filter with `RUST_LOG` (default `info`).
pub fn init_function_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facepipe_core::Embedding;
    use facepipe_io::{ChannelInvoker, ExtractError, FrameExtractor, FsStore};
    use serde_json::{json, Value};
    use std::path::Path;

    struct StillFrame;

    #[async_trait]
    impl FrameExtractor for StillFrame {
        async fn extract_frame(&self, _input: &Path, output: &Path) -> Result<(), ExtractError> {
            tokio::fs::write(output, b"frame").await.unwrap();
            Ok(())
        }
    }

    /// Sees the same face in every frame.
    struct KnownFace(Vec<f32>);

    #[async_trait]
    impl FaceAnalyzer for KnownFace {
        async fn analyze(&self, image: &Path) -> Result<Option<Embedding>, EngineError> {
            assert_eq!(std::fs::read(image).unwrap(), b"frame");
            Ok(Some(Embedding::new(self.0.clone())))
        }
    }

    #[tokio::test]
    async fn test_video_to_recognized_name() {
        let dir = tempfile::tempdir().unwrap();
        let work_root = dir.path().join("work");
        let store_root = dir.path().join("store");
        std::fs::create_dir_all(&work_root).unwrap();
        std::fs::create_dir_all(store_root.join("videos-in")).unwrap();
        std::fs::write(store_root.join("videos-in/v.mp4"), b"video").unwrap();
        let gallery_path = dir.path().join("data.json");
        std::fs::write(
            &gallery_path,
            r#"{"names": ["alice", "bob", "carol"], "embeddings": [[1, 0, 0], [0, 1, 0], [0, 0, 1]]}"#,
        )
        .unwrap();

        let (invoker, mut rx) = ChannelInvoker::new();
        let splitter = FrameSplitter::new(
            FsStore::new(&store_root),
            StillFrame,
            invoker,
            SplitSettings {
                work_root: work_root.clone(),
                intermediate_bucket: "stage-1".into(),
                recognition_function: "face-recognition".into(),
                frame_extension: "jpg".into(),
            },
        );
        let recognition = FaceRecognition::new(
            FsStore::new(&store_root),
            KnownFace(vec![0.05, 0.98, 0.0]),
            RecognizeSettings {
                work_root: work_root.clone(),
                // Not the bucket stage 1 wrote to: the hand-off must name it.
                intermediate_bucket: "unused-fallback".into(),
                output_bucket: "out".into(),
                gallery_path,
                max_distance: None,
            },
        );

        let event = json!({ "Records": [{ "s3": { "bucket": { "name": "videos-in" }, "object": { "key": "v.mp4" } } }] });
        let split = splitter.handle(&event).await;
        assert_eq!(split, Response::ok("Frame extracted and uploaded to stage-1/v.jpg"));

        let invocation = rx.try_recv().unwrap();
        assert_eq!(invocation.function, "face-recognition");
        let payload: Value = serde_json::from_slice(&invocation.payload).unwrap();
        let recognized = recognition.handle(&payload).await;

        assert_eq!(recognized, Response::ok("Recognized face: bob"));
        assert_eq!(std::fs::read_to_string(store_root.join("out/v.txt")).unwrap(), "bob");
        assert!(!store_root.join("unused-fallback").exists());
        assert!(std::fs::read_dir(&work_root).unwrap().next().is_none());
    }
}
