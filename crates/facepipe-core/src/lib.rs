//! facepipe-core — Face detection, recognition and gallery matching.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime on the CPU. Embeddings are matched against a
//! precomputed gallery by nearest Euclidean distance.

pub mod alignment;
pub mod detector;
pub mod gallery;
pub mod recognizer;
pub mod types;

pub use detector::{DetectorError, FaceDetector};
pub use gallery::{Gallery, GalleryError};
pub use recognizer::{FaceRecognizer, RecognizerError};
pub use types::{BoundingBox, Embedding, EuclideanMatcher, MatchError, MatchResult, Matcher};
