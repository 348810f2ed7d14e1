use crate::gallery::Gallery;
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean (L2) distance between two embeddings of equal dimension.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("gallery is empty")]
    EmptyGallery,
    #[error("probe embedding has {actual} dimensions, gallery expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("no finite distance between probe and gallery (probe contains NaN or infinity)")]
    NoFiniteDistance,
}

/// Nearest gallery entry for a probe embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Position of the entry in the gallery.
    pub index: usize,
    pub name: String,
    pub distance: f32,
}

impl MatchResult {
    /// Whether the match passes an optional maximum-distance cutoff.
    /// With no cutoff every nearest entry is accepted.
    pub fn within(&self, max_distance: Option<f32>) -> bool {
        max_distance.map_or(true, |max| self.distance <= max)
    }
}

/// Strategy for finding the closest gallery entry to a probe embedding.
pub trait Matcher {
    fn nearest(&self, probe: &Embedding, gallery: &Gallery) -> Result<MatchResult, MatchError>;
}

/// Nearest-neighbour matcher over Euclidean distance.
///
/// Scans the whole gallery in order; on ties the lowest index wins.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn nearest(&self, probe: &Embedding, gallery: &Gallery) -> Result<MatchResult, MatchError> {
        if gallery.is_empty() {
            return Err(MatchError::EmptyGallery);
        }
        let expected = gallery.dim().unwrap_or_default();
        if probe.dim() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: probe.dim(),
            });
        }

        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, (embedding, _)) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(embedding);
            // Strict comparison keeps the first minimum.
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        let idx = best_idx.ok_or(MatchError::NoFiniteDistance)?;
        Ok(MatchResult {
            index: idx,
            name: gallery.name(idx).to_string(),
            distance: best_dist,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    fn abc_gallery() -> Gallery {
        Gallery::new(
            vec![emb(&[1.0, 0.0, 0.0]), emb(&[0.0, 1.0, 0.0]), emb(&[0.0, 0.0, 1.0])],
            vec!["alice".into(), "bob".into(), "carol".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_euclidean_distance_identical() {
        let a = emb(&[0.3, -0.2, 0.9]);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_known_value() {
        let a = emb(&[0.0, 0.0]);
        let b = emb(&[3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_match_wins() {
        let probe = emb(&[0.0, 1.0, 0.0]);
        let result = EuclideanMatcher.nearest(&probe, &abc_gallery()).unwrap();
        assert_eq!(result.name, "bob");
        assert_eq!(result.index, 1);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_tie_prefers_lower_index() {
        let gallery = Gallery::new(
            vec![emb(&[1.0, 0.0]), emb(&[-1.0, 0.0]), emb(&[0.0, 5.0])],
            vec!["first".into(), "second".into(), "far".into()],
        )
        .unwrap();
        let probe = emb(&[0.0, 0.0]);
        let result = EuclideanMatcher.nearest(&probe, &gallery).unwrap();
        assert_eq!(result.name, "first");
        assert_eq!(result.index, 0);
    }

    #[test]
    fn test_nearest_scans_whole_gallery() {
        // Best match is the last entry.
        let probe = emb(&[0.0, 0.0, 0.9]);
        let result = EuclideanMatcher.nearest(&probe, &abc_gallery()).unwrap();
        assert_eq!(result.name, "carol");
    }

    #[test]
    fn test_far_probe_still_matches_without_cutoff() {
        let probe = emb(&[100.0, 0.0, 0.0]);
        let result = EuclideanMatcher.nearest(&probe, &abc_gallery()).unwrap();
        assert_eq!(result.name, "alice");
        assert!(result.within(None));
        assert!(!result.within(Some(1.0)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let probe = emb(&[1.0, 0.0]);
        let err = EuclideanMatcher.nearest(&probe, &abc_gallery()).unwrap_err();
        assert!(matches!(
            err,
            MatchError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_nan_probe_reports_no_finite_distance() {
        let probe = emb(&[f32::NAN, 0.0, 0.0]);
        let err = EuclideanMatcher.nearest(&probe, &abc_gallery()).unwrap_err();
        assert!(matches!(err, MatchError::NoFiniteDistance));
        assert!(!err.to_string().contains("empty"));
    }

    #[test]
    fn test_repeated_matching_is_stable() {
        let probe = emb(&[0.2, 0.7, 0.1]);
        let gallery = abc_gallery();
        let first = EuclideanMatcher.nearest(&probe, &gallery).unwrap();
        for _ in 0..5 {
            assert_eq!(EuclideanMatcher.nearest(&probe, &gallery).unwrap(), first);
        }
    }
}
