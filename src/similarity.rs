//! Vector similarity for semantic retrieval

use ordered_float::OrderedFloat;

/// Compute cosine similarity between two vectors
///
/// Returns 0.0 for mismatched lengths or zero vectors, otherwise a value
/// in [-1, 1].
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Sort scored items descending and keep the top k
pub fn top_k_by_score<T>(mut scored: Vec<(f32, T)>, k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| OrderedFloat(b.0).cmp(&OrderedFloat(a.0)));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);

        let a = vec![1.0, 1.0];
        let b = vec![-1.0, -1.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let v = vec![0.3, -0.7, 0.64, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_top_k_ordering() {
        let scored = vec![(0.2, "b"), (0.9, "a"), (0.5, "c")];
        let top = top_k_by_score(scored, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].1, "a");
        assert_eq!(top[1].1, "c");
    }
}
