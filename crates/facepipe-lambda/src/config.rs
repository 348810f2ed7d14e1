use std::path::PathBuf;

use crate::recognize::RecognizeSettings;
use crate::split::SplitSettings;

/// Function configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the per-invocation working directories (default: system temp dir).
    pub work_root: PathBuf,
    /// Bucket receiving extracted frames.
    pub intermediate_bucket: String,
    /// Bucket receiving recognition results.
    pub output_bucket: String,
    /// Function invoked with the hand-off payload.
    pub recognition_function: String,
    /// ffmpeg binary (a Lambda layer typically ships it as /opt/bin/ffmpeg).
    pub ffmpeg_path: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Extension, and therefore image format, of extracted frames.
    pub frame_extension: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// JSON gallery of known embeddings and names.
    pub gallery_path: PathBuf,
    /// Optional Euclidean cutoff; unset means the nearest entry always wins.
    pub max_distance: Option<f32>,
    /// Custom S3 endpoint (e.g. MinIO).
    pub s3_endpoint_url: Option<String>,
    pub s3_force_path_style: bool,
}

impl Config {
    /// Load configuration from `FACEPIPE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let s3_endpoint_url = env_opt("FACEPIPE_S3_ENDPOINT_URL");
        let s3_force_path_style = std::env::var("FACEPIPE_S3_FORCE_PATH_STYLE")
            .map(|v| v != "0" && v != "false")
            .unwrap_or(s3_endpoint_url.is_some());

        Self {
            work_root: env_opt("FACEPIPE_WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            intermediate_bucket: env_string("FACEPIPE_INTERMEDIATE_BUCKET", "facepipe-stage-1"),
            output_bucket: env_string("FACEPIPE_OUTPUT_BUCKET", "facepipe-output"),
            recognition_function: env_string("FACEPIPE_RECOGNITION_FUNCTION", "face-recognition"),
            ffmpeg_path: PathBuf::from(env_string("FACEPIPE_FFMPEG_PATH", "ffmpeg")),
            frame_width: env_u32("FACEPIPE_FRAME_WIDTH", 640),
            frame_height: env_u32("FACEPIPE_FRAME_HEIGHT", 480),
            frame_extension: env_string("FACEPIPE_FRAME_EXTENSION", "jpg"),
            model_dir: PathBuf::from(env_string("FACEPIPE_MODEL_DIR", "models")),
            gallery_path: PathBuf::from(env_string("FACEPIPE_GALLERY_PATH", "data.json")),
            max_distance: env_max_distance("FACEPIPE_MAX_DISTANCE"),
            s3_endpoint_url,
            s3_force_path_style,
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join("det_10g.onnx")
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> PathBuf {
        self.model_dir.join("w600k_r50.onnx")
    }

    pub fn split_settings(&self) -> SplitSettings {
        SplitSettings {
            work_root: self.work_root.clone(),
            intermediate_bucket: self.intermediate_bucket.clone(),
            recognition_function: self.recognition_function.clone(),
            frame_extension: self.frame_extension.clone(),
        }
    }

    pub fn recognize_settings(&self) -> RecognizeSettings {
        RecognizeSettings {
            work_root: self.work_root.clone(),
            intermediate_bucket: self.intermediate_bucket.clone(),
            output_bucket: self.output_bucket.clone(),
            gallery_path: self.gallery_path.clone(),
            max_distance: self.max_distance,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_string(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// A cutoff must be a finite, non-negative distance. Anything else would
/// reject every face, so it is dropped with a warning.
fn env_max_distance(key: &str) -> Option<f32> {
    let raw = env_opt(key)?;
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring unusable maximum distance");
            None
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
