//! Text → vector embedders.

use crate::{IndexError, VectorEmbedding};

pub trait Embedder: Send + Sync {
    /// Stable identifier, e.g. `fnv1a-384`.
    fn id(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<VectorEmbedding, IndexError>;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Feature-hashing embedder: lowercase alphanumeric tokens hashed into signed buckets.
///
/// Deterministic and dependency-free, so it is always available; it captures
/// lexical overlap only.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            id: format!("fnv1a-{dimension}"),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<VectorEmbedding, IndexError> {
        let mut v = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        Ok(VectorEmbedding(v))
    }
}

/// L2-normalize in place; zero vectors stay zero.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_unit_length() -> Result<(), IndexError> {
        let e = HashEmbedder::new(64);
        let a = e.embed("Garden, garage and a BALCONY")?;
        let b = e.embed("garden garage and a balcony")?;
        assert_eq!(a, b);
        assert_eq!(a.dimension(), 64);
        let norm: f32 = a.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn empty_text_embeds_to_zero() -> Result<(), IndexError> {
        let v = HashEmbedder::new(8).embed("  ,, ")?;
        assert!(v.as_slice().iter().all(|x| *x == 0.0));
        Ok(())
    }

    #[test]
    fn id_reflects_dimension() {
        assert_eq!(HashEmbedder::default().id(), "fnv1a-384");
        assert_eq!(HashEmbedder::new(0).dimension(), 1);
    }
}
