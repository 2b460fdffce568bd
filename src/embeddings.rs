//! Text embedding behind a substitutable trait
//!
//! The built-in `HashEmbedder` is a deterministic character-fold vectorizer:
//! identical inputs always produce identical vectors, and near-duplicate text
//! lands close in cosine space. That is sufficient for the reproducibility
//! and ranking contracts of the graph; linguistic fidelity is not a goal.
//! A real model (local ONNX, remote API) slots in behind `Embedder` without
//! changing any caller.

use async_trait::async_trait;

use crate::constants::DEFAULT_EMBEDDING_DIM;
use crate::errors::Result;

/// Fixed-dimension text embedder
///
/// Implementations must be deterministic per input and always return vectors
/// of exactly `dim()` components. The trait is async so an external model
/// call can sit behind it; callers wrap invocations in a bounded timeout.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed output dimensionality
    fn dim(&self) -> usize;

    /// Embed one text into a vector of `dim()` floats
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic character-fold embedder
///
/// Folds each character code into `position = char_index mod dim`, weighted
/// by inverse total length, then L2-normalizes. Case-insensitive so trivial
/// casing differences do not perturb similarity.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Synchronous core, also used directly by tests
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let total_chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1) as f32;

        let mut index = 0usize;
        for word in text.split_whitespace() {
            for ch in word.chars().flat_map(|c| c.to_lowercase()) {
                vector[index % self.dim] += (ch as u32) as f32 / total_chars;
                index += 1;
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Normalize a vector to unit length in place; zero vectors are left as-is
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed_sync("the quick brown fox");
        let b = embedder.embed_sync("the quick brown fox");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_dimensionality() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed_sync("short").len(), 64);
        assert_eq!(
            embedder
                .embed_sync("a considerably longer sentence with many more words in it")
                .len(),
            64
        );
    }

    #[test]
    fn test_unit_norm() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_sync("normalize me");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_sync("");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_near_duplicates_score_higher_than_unrelated() {
        let embedder = HashEmbedder::default();
        let base = embedder.embed_sync("Paris is the capital of France");
        let near = embedder.embed_sync("paris is the capital of france!");
        let far = embedder.embed_sync("zq");

        let near_sim = cosine_similarity(&base, &near);
        let far_sim = cosine_similarity(&base, &far);
        assert!(near_sim > 0.9, "near-duplicate similarity was {near_sim}");
        assert!(near_sim > far_sim);
    }

    #[tokio::test]
    async fn test_trait_object_embedding() {
        let embedder: Box<dyn Embedder> = Box::new(HashEmbedder::default());
        let v = embedder.embed("trait seam").await.unwrap();
        assert_eq!(v.len(), embedder.dim());
    }
}
