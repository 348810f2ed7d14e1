//! Frame-extraction stage: video upload → one still frame → recognition hand-off.

use facepipe_io::{FrameExtractor, Invoker, ObjectStore, WorkDir};
use serde_json::Value;
use std::path::PathBuf;

use crate::error::StageError;
use crate::event::{HandoffPayload, ObjectLocation, Response, StorageEvent};
use crate::keys;

/// Settings for [`FrameSplitter`].
#[derive(Debug, Clone)]
pub struct SplitSettings {
    pub work_root: PathBuf,
    pub intermediate_bucket: String,
    pub recognition_function: String,
    pub frame_extension: String,
}

/// Handles storage events for uploaded videos.
pub struct FrameSplitter<S, X, I> {
    store: S,
    extractor: X,
    invoker: I,
    settings: SplitSettings,
}

impl<S, X, I> FrameSplitter<S, X, I>
where
    S: ObjectStore,
    X: FrameExtractor,
    I: Invoker,
{
    pub fn new(store: S, extractor: X, invoker: I, settings: SplitSettings) -> Self {
        Self {
            store,
            extractor,
            invoker,
            settings,
        }
    }

    /// Process one storage event. Never fails: every fault becomes a 500 result.
    pub async fn handle(&self, event: &Value) -> Response {
        match self.run(event).await {
            Ok(frame) => Response::ok(format!(
                "Frame extracted and uploaded to {}/{}",
                frame.bucket, frame.key
            )),
            Err(e) => {
                tracing::error!(step = e.step(), error = %e, "frame extraction failed");
                Response::server_error(e.to_string())
            }
        }
    }

    async fn run(&self, event: &Value) -> Result<ObjectLocation, StageError> {
        let video = StorageEvent::from_value(event)?.first_object()?;
        tracing::info!(bucket = %video.bucket, key = %video.key, "processing video");

        // Removed on every return path below.
        let work = WorkDir::create(&self.settings.work_root).map_err(StageError::Workspace)?;

        let frame_key = keys::frame_key(&video.key, &self.settings.frame_extension);
        let video_path = work.file(&format!("source-{}", keys::file_name(&video.key)));
        let frame_path = work.file(keys::file_name(&frame_key));

        self.store
            .download(&video.bucket, &video.key, &video_path)
            .await
            .map_err(|source| StageError::Acquisition {
                bucket: video.bucket.clone(),
                key: video.key.clone(),
                source,
            })?;

        self.extractor.extract_frame(&video_path, &frame_path).await?;

        let bucket = &self.settings.intermediate_bucket;
        self.store
            .upload(&frame_path, bucket, &frame_key)
            .await
            .map_err(|source| StageError::Persistence {
                bucket: bucket.clone(),
                key: frame_key.clone(),
                source,
            })?;

        let payload = HandoffPayload {
            bucket_name: Some(bucket.clone()),
            img_file_name: frame_key.clone(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| StageError::Unexpected(format!("encode hand-off payload: {e}")))?;
        let function = &self.settings.recognition_function;
        tracing::info!(function = %function, payload = %String::from_utf8_lossy(&body), "handing off frame");

        self.invoker
            .invoke_async(function, &body)
            .await
            .map_err(|source| StageError::Handoff {
                function: function.clone(),
                source,
            })?;

        Ok(ObjectLocation {
            bucket: bucket.clone(),
            key: frame_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facepipe_io::{ChannelInvoker, ExtractError, FsStore, Invocation};
    use serde_json::json;
    use std::path::Path;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Writes a fixed frame, or fails like a corrupt video would.
    struct FakeExtractor {
        fail: bool,
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract_frame(&self, input: &Path, output: &Path) -> Result<(), ExtractError> {
            assert!(input.exists(), "video must be downloaded before extraction");
            if self.fail {
                return Err(ExtractError::Failed {
                    program: "ffmpeg".into(),
                    status: "exit status: 1".into(),
                    stderr: "Invalid data found when processing input".into(),
                });
            }
            tokio::fs::write(output, b"frame").await.unwrap();
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        work_root: PathBuf,
        store_root: PathBuf,
        rx: UnboundedReceiver<Invocation>,
        splitter: FrameSplitter<FsStore, FakeExtractor, ChannelInvoker>,
    }

    fn harness(fail_extraction: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let work_root = dir.path().join("work");
        let store_root = dir.path().join("store");
        std::fs::create_dir_all(&work_root).unwrap();
        std::fs::create_dir_all(store_root.join("videos-in/clips")).unwrap();
        std::fs::write(store_root.join("videos-in/test_00.mp4"), b"video").unwrap();
        std::fs::write(store_root.join("videos-in/clips/x.mov"), b"video").unwrap();

        let (invoker, rx) = ChannelInvoker::new();
        let settings = SplitSettings {
            work_root: work_root.clone(),
            intermediate_bucket: "stage-1".into(),
            recognition_function: "face-recognition".into(),
            frame_extension: "jpg".into(),
        };
        let splitter = FrameSplitter::new(
            FsStore::new(&store_root),
            FakeExtractor { fail: fail_extraction },
            invoker,
            settings,
        );
        Harness { _dir: dir, work_root, store_root, rx, splitter }
    }

    fn event(bucket: &str, key: &str) -> Value {
        json!({ "Records": [{ "s3": { "bucket": { "name": bucket }, "object": { "key": key } } }] })
    }

    fn work_root_is_empty(h: &Harness) -> bool {
        std::fs::read_dir(&h.work_root).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_success_uploads_frame_and_hands_off() {
        let mut h = harness(false);
        let resp = h.splitter.handle(&event("videos-in", "test_00.mp4")).await;

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, "Frame extracted and uploaded to stage-1/test_00.jpg");
        assert_eq!(std::fs::read(h.store_root.join("stage-1/test_00.jpg")).unwrap(), b"frame");

        let invocation = h.rx.try_recv().unwrap();
        assert_eq!(invocation.function, "face-recognition");
        let payload: Value = serde_json::from_slice(&invocation.payload).unwrap();
        assert_eq!(payload, json!({ "bucket_name": "stage-1", "img_file_name": "test_00.jpg" }));
        assert!(h.rx.try_recv().is_err(), "exactly one hand-off");

        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn test_prefixed_key_keeps_prefix() {
        let mut h = harness(false);
        let resp = h.splitter.handle(&event("videos-in", "clips/x.mov")).await;
        assert_eq!(resp.status_code, 200);
        assert!(h.store_root.join("stage-1/clips/x.jpg").exists());
        let payload: HandoffPayload = serde_json::from_slice(&h.rx.try_recv().unwrap().payload).unwrap();
        assert_eq!(payload.img_file_name, "clips/x.jpg");
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_handoff() {
        let mut h = harness(true);
        let resp = h.splitter.handle(&event("videos-in", "test_00.mp4")).await;

        assert_eq!(resp.status_code, 500);
        assert!(resp.body.starts_with("error during frame extraction"), "{}", resp.body);
        assert!(h.rx.try_recv().is_err());
        assert!(!h.store_root.join("stage-1").exists());
        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn test_missing_video_is_acquisition_failure() {
        let mut h = harness(false);
        let resp = h.splitter.handle(&event("videos-in", "missing.mp4")).await;

        assert_eq!(resp.status_code, 500);
        assert_eq!(
            resp.body,
            "failed to download videos-in/missing.mp4: object videos-in/missing.mp4 not found"
        );
        assert!(h.rx.try_recv().is_err());
        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn test_malformed_event() {
        let mut h = harness(false);
        let resp = h.splitter.handle(&json!({ "detail": "not a storage event" })).await;
        assert_eq!(resp.status_code, 500);
        assert!(resp.body.starts_with("invalid event"));
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_is_handoff_failure() {
        let Harness { _dir, work_root, store_root, rx, splitter } = harness(false);
        drop(rx);
        let resp = splitter.handle(&event("videos-in", "test_00.mp4")).await;

        assert_eq!(resp.status_code, 500);
        assert!(resp.body.starts_with("failed to hand off to face-recognition"), "{}", resp.body);
        // The frame was already persisted before the hand-off.
        assert!(store_root.join("stage-1/test_00.jpg").exists());
        assert!(std::fs::read_dir(&work_root).unwrap().next().is_none());
    }
}
