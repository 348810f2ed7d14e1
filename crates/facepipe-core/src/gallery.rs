//! Precomputed gallery of known face embeddings.
//!
//! The gallery file is JSON with two index-aligned lists:
//!
//! ```text
//! { "names": ["alice", "bob"], "embeddings": [[0.01, ...], [0.12, ...]] }
//! ```
//!
//! Entry `i` of `embeddings` belongs to entry `i` of `names`.

use crate::types::Embedding;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("failed to read gallery {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed gallery file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("gallery has {embeddings} embeddings but {names} names")]
    LengthMismatch { embeddings: usize, names: usize },
    #[error("gallery is empty")]
    Empty,
    #[error("gallery entry {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Deserialize)]
struct GalleryFile {
    names: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Read-only, index-aligned set of (embedding, name) pairs.
#[derive(Debug, Clone)]
pub struct Gallery {
    embeddings: Vec<Embedding>,
    names: Vec<String>,
}

impl Gallery {
    /// Build a gallery, rejecting misaligned, empty or ragged input.
    pub fn new(embeddings: Vec<Embedding>, names: Vec<String>) -> Result<Self, GalleryError> {
        if embeddings.len() != names.len() {
            return Err(GalleryError::LengthMismatch {
                embeddings: embeddings.len(),
                names: names.len(),
            });
        }
        let Some(first) = embeddings.first() else {
            return Err(GalleryError::Empty);
        };
        let expected = first.dim();
        if let Some((index, e)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.dim() != expected)
        {
            return Err(GalleryError::DimensionMismatch {
                index,
                expected,
                actual: e.dim(),
            });
        }

        Ok(Self { embeddings, names })
    }

    /// Parse a gallery from its JSON representation.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GalleryError> {
        let file: GalleryFile = serde_json::from_slice(bytes)?;
        let embeddings = file.embeddings.into_iter().map(Embedding::new).collect();
        Self::new(embeddings, file.names)
    }

    /// Load a gallery file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GalleryError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| GalleryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let gallery = Self::from_json(&bytes)?;

        tracing::info!(
            path = %path.display(),
            entries = gallery.len(),
            dim = ?gallery.dim(),
            "loaded face gallery"
        );

        Ok(gallery)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Embedding dimension shared by every entry.
    pub fn dim(&self) -> Option<usize> {
        self.embeddings.first().map(Embedding::dim)
    }

    /// Name at gallery position `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Embedding, &str)> {
        self.embeddings
            .iter()
            .zip(self.names.iter().map(String::as_str))
    }
}
