//! Semantic / vector search boundary.
//!
//! The engine only sees [`EmbeddingIndex`]: text in, ranked listing ids out.
//! [`FlatIndex`] with [`HashEmbedder`] is the always-available default
//! backend; a remote index service or an ML embedder plugs in behind the same
//! traits.

pub mod ann;
pub mod embedder;
pub mod vectors;

pub use ann::flat::FlatIndex;
pub use embedder::{Embedder, HashEmbedder};
pub use vectors::{VectorFile, VectorFileHeader, VectorRecord, load_vector_file};

use core_types::ListingId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEmbedding(pub Vec<f32>);

impl VectorEmbedding {
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// One ranked match returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: ListingId,
    pub score: f32,
}

impl Neighbor {
    pub fn new(id: impl Into<ListingId>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Result of the startup health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHealth {
    pub vectors: usize,
    pub dimension: usize,
    pub backend: String,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding index unavailable: {0}")]
    Unavailable(String),
    #[error("embedding index is empty")]
    Empty,
    #[error("vector for {id} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("vectors were produced by embedder {found}, but queries use {expected}")]
    EmbedderMismatch { expected: String, found: String },
    #[error("vector for {id} has non-finite components")]
    NonFinite { id: String },
    #[error("vector file line {line}: {reason}")]
    VectorFile { line: usize, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// k-NN service contract. Ranked order is the index's own; ties are not re-sorted by callers.
pub trait EmbeddingIndex: Send + Sync {
    /// Top-`k` neighbors of `text`, best first.
    fn query(&self, text: &str, k: usize) -> Result<Vec<Neighbor>, IndexError>;

    /// Fails when the index is unreachable or holds no vectors.
    fn health(&self) -> Result<IndexHealth, IndexError>;
}
