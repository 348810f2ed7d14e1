//! Recognition stage: stored frame → primary face → nearest gallery name.

use async_trait::async_trait;
use facepipe_core::{Embedding, EuclideanMatcher, Gallery, MatchResult, Matcher};
use facepipe_io::{ObjectStore, WorkDir};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::engine::EngineError;
use crate::error::StageError;
use crate::event::{HandoffPayload, Response};
use crate::keys;

/// Face detection and embedding of an image file.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    /// Embedding of the primary face, or `None` when no face is found.
    async fn analyze(&self, image: &Path) -> Result<Option<Embedding>, EngineError>;
}

/// Settings for [`FaceRecognition`].
#[derive(Debug, Clone)]
pub struct RecognizeSettings {
    pub work_root: PathBuf,
    /// Used when the payload carries no `bucket_name`.
    pub intermediate_bucket: String,
    pub output_bucket: String,
    pub gallery_path: PathBuf,
    pub max_distance: Option<f32>,
}

/// Non-fault outcome of one recognition.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Recognized(MatchResult),
    NoFace,
    /// Nearest entry rejected by the configured maximum distance.
    Unrecognized(MatchResult),
}

/// Handles hand-off payloads pointing at extracted frames.
pub struct FaceRecognition<S, A> {
    store: S,
    analyzer: A,
    settings: RecognizeSettings,
    gallery: OnceCell<Arc<Gallery>>,
}

impl<S, A> FaceRecognition<S, A>
where
    S: ObjectStore,
    A: FaceAnalyzer,
{
    /// The gallery is read from `settings.gallery_path` on first use.
    pub fn new(store: S, analyzer: A, settings: RecognizeSettings) -> Self {
        Self {
            store,
            analyzer,
            settings,
            gallery: OnceCell::new(),
        }
    }

    /// Use an already loaded gallery instead of reading `gallery_path`.
    pub fn with_gallery(mut self, gallery: Arc<Gallery>) -> Self {
        self.gallery = OnceCell::from(gallery);
        self
    }

    /// The process-wide gallery, loaded once. A failed load is retried by
    /// the next caller.
    pub async fn gallery(&self) -> Result<Arc<Gallery>, StageError> {
        self.gallery
            .get_or_try_init(|| async {
                let path = self.settings.gallery_path.clone();
                let gallery = tokio::task::spawn_blocking(move || Gallery::load(path))
                    .await
                    .map_err(|e| StageError::Unexpected(format!("gallery loader: {e}")))??;
                Ok::<_, StageError>(Arc::new(gallery))
            })
            .await
            .cloned()
    }

    /// Process one hand-off payload. Never fails: faults become 500 results,
    /// frames without a recognizable face become 400 results.
    pub async fn handle(&self, event: &Value) -> Response {
        match self.run(event).await {
            Ok((_, Recognition::Recognized(m))) => Response::ok(format!("Recognized face: {}", m.name)),
            Ok((key, Recognition::NoFace)) => Response::client_error(format!("No face detected in {key}.")),
            Ok((key, Recognition::Unrecognized(m))) => Response::client_error(format!(
                "No known face recognized in {key} (nearest distance {:.4}).",
                m.distance
            )),
            Err(e) => {
                tracing::error!(step = e.step(), error = %e, "face recognition failed");
                Response::server_error(e.to_string())
            }
        }
    }

    async fn run(&self, event: &Value) -> Result<(String, Recognition), StageError> {
        let payload = HandoffPayload::from_value(event)?;
        if payload.img_file_name.is_empty() {
            return Err(StageError::InvalidEvent("img_file_name is empty".into()));
        }
        let bucket = payload
            .bucket_name
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.settings.intermediate_bucket.clone());
        let key = payload.img_file_name;
        tracing::info!(bucket = %bucket, key = %key, "processing frame");

        let work = WorkDir::create(&self.settings.work_root).map_err(StageError::Workspace)?;
        let image_path = work.file(keys::file_name(&key));

        self.store
            .download(&bucket, &key, &image_path)
            .await
            .map_err(|source| StageError::Acquisition {
                bucket: bucket.clone(),
                key: key.clone(),
                source,
            })?;

        let Some(embedding) = self.analyzer.analyze(&image_path).await? else {
            tracing::info!(key = %key, "no face detected");
            return Ok((key, Recognition::NoFace));
        };

        let gallery = self.gallery().await?;
        let nearest = EuclideanMatcher.nearest(&embedding, &gallery)?;
        tracing::info!(
            key = %key,
            name = %nearest.name,
            index = nearest.index,
            distance = nearest.distance,
            model = embedding.model_version.as_deref().unwrap_or("unknown"),
            "nearest gallery entry"
        );

        if !nearest.within(self.settings.max_distance) {
            tracing::warn!(
                key = %key,
                distance = nearest.distance,
                max_distance = ?self.settings.max_distance,
                "nearest entry beyond maximum distance"
            );
            return Ok((key, Recognition::Unrecognized(nearest)));
        }

        let result_key = keys::result_key(&key);
        let result_path = work.file(keys::file_name(&result_key));
        tokio::fs::write(&result_path, nearest.name.as_bytes())
            .await
            .map_err(StageError::ResultFile)?;

        let output = &self.settings.output_bucket;
        self.store
            .upload(&result_path, output, &result_key)
            .await
            .map_err(|source| StageError::Persistence {
                bucket: output.clone(),
                key: result_key.clone(),
                source,
            })?;

        Ok((key, Recognition::Recognized(nearest)))
    }
}
