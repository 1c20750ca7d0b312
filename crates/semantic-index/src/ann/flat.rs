use std::sync::Arc;

use core_types::ListingId;
use rayon::prelude::*;
use tracing::debug;

use crate::embedder::{Embedder, normalize};
use crate::{EmbeddingIndex, IndexError, IndexHealth, Neighbor, VectorRecord};

/// Exact cosine k-NN over an in-memory vector slab.
///
/// Vectors are normalized on insert, so scoring is a plain dot product.
/// Ranking is by descending score; equal scores keep insertion order.
pub struct FlatIndex {
    embedder: Arc<dyn Embedder>,
    ids: Vec<ListingId>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Embed every `(id, text)` pair in parallel and index the results in input order.
    pub fn from_texts<I, S>(embedder: Arc<dyn Embedder>, items: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (ListingId, S)>,
        S: AsRef<str> + Send + Sync,
    {
        let items: Vec<(ListingId, S)> = items.into_iter().collect();
        let embedded = items
            .par_iter()
            .map(|(id, text)| {
                embedder
                    .embed(text.as_ref())
                    .map(|v| (id.clone(), v.0))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut index = Self::new(embedder);
        for (id, vector) in embedded {
            index.insert(id, vector)?;
        }
        debug!(vectors = index.len(), "built flat index from texts");
        Ok(index)
    }

    /// Index precomputed vectors (see [`crate::load_vector_file`]).
    pub fn from_records(
        embedder: Arc<dyn Embedder>,
        records: Vec<VectorRecord>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(embedder);
        for rec in records {
            index.insert(rec.listing_id(), rec.embedding)?;
        }
        Ok(index)
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add a vector for a listing.
    pub fn insert(&mut self, id: ListingId, mut vector: Vec<f32>) -> Result<(), IndexError> {
        let expected = self.dimension();
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                id: id.to_string(),
                expected,
                found: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite { id: id.to_string() });
        }
        normalize(&mut vector);
        self.ids.push(id);
        self.vectors.extend_from_slice(&vector);
        Ok(())
    }

    /// Search for nearest neighbors of an already-embedded query.
    pub fn search_vector(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let dim = self.dimension();
        if k == 0 || query.len() != dim {
            return Vec::new();
        }
        let mut q = query.to_vec();
        normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dim)
            .map(|row| row.iter().zip(&q).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();
        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| Neighbor {
                id: self.ids[i].clone(),
                score,
            })
            .collect()
    }
}

impl EmbeddingIndex for FlatIndex {
    fn query(&self, text: &str, k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.is_empty() {
            return Err(IndexError::Empty);
        }
        let q = self.embedder.embed(text)?;
        Ok(self.search_vector(q.as_slice(), k))
    }

    fn health(&self) -> Result<IndexHealth, IndexError> {
        if self.is_empty() {
            return Err(IndexError::Empty);
        }
        Ok(IndexHealth {
            vectors: self.len(),
            dimension: self.dimension(),
            backend: format!("flat/{}", self.embedder.id()),
        })
    }
}
