use async_trait::async_trait;
use facepipe_core::{BoundingBox, DetectorError, Embedding, FaceDetector, FaceRecognizer, RecognizerError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::recognize::FaceAnalyzer;

/// Requests that may wait for the engine thread before senders block.
const ENGINE_QUEUE_DEPTH: usize = 4;

/// Faces whose shorter side is below this many pixels are ignored.
const MIN_FACE_SIZE: f32 = 20.0;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("failed to start engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from invocation handlers to the engine thread.
enum EngineRequest {
    Analyze {
        path: PathBuf,
        reply: oneshot::Sender<Result<Option<Embedding>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect the primary face in the image file at `path` and embed it.
    ///
    /// Returns `Ok(None)` when the image contains no detectable face.
    pub async fn analyze_image(&self, path: &Path) -> Result<Option<Embedding>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                path: path.to_path_buf(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

#[async_trait]
impl FaceAnalyzer for EngineHandle {
    async fn analyze(&self, image: &Path) -> Result<Option<Embedding>, EngineError> {
        self.analyze_image(image).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The ONNX sessions need exclusive access, so one thread owns both models
/// and serves requests in arrival order. Models are loaded before the thread
/// starts; a missing or broken model fails the caller immediately.
pub fn spawn_engine(scrfd_path: &Path, arcface_path: &Path) -> Result<EngineHandle, EngineError> {
    let mut detector = FaceDetector::load(scrfd_path)?;
    tracing::info!(path = %scrfd_path.display(), "SCRFD detector loaded");

    let mut recognizer = FaceRecognizer::load(arcface_path)?;
    tracing::info!(path = %arcface_path.display(), "ArcFace recognizer loaded");

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("facepipe-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { path, reply } => {
                        let result = run_analyze(&mut detector, &mut recognizer, &path);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

/// Decode an image, detect faces and embed the primary one.
fn run_analyze(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    path: &Path,
) -> Result<Option<Embedding>, EngineError> {
    let image = image::open(path)?.to_rgb8();

    let faces = detector.detect(&image)?;
    let Some(face) = primary_face(&faces) else {
        tracing::info!(path = %path.display(), "no face detected");
        return Ok(None);
    };

    tracing::info!(
        path = %path.display(),
        faces = faces.len(),
        confidence = face.confidence,
        area = face.area(),
        "primary face selected"
    );

    let embedding = recognizer.extract(&image, face)?;
    Ok(Some(embedding))
}

/// The largest face of at least `MIN_FACE_SIZE` pixels. Equal areas keep the
/// earlier, more confident detection.
fn primary_face(faces: &[BoundingBox]) -> Option<&BoundingBox> {
    faces
        .iter()
        .filter(|f| f.width.min(f.height) >= MIN_FACE_SIZE)
        .fold(None, |best: Option<&BoundingBox>, f| match best {
            Some(b) if b.area() >= f.area() => Some(b),
            _ => Some(f),
        })
}
