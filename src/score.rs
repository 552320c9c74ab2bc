//! Embedding-similarity understanding scorer.
//!
//! Compares a stored document (reference) embedding against a learner
//! response embedding and produces an integer score in `[0, 100]`.
//! Negative cosine similarity clamps to 0: a response is judged
//! "uncorrelated" with the material, never "negatively correlated".

use crate::error::{Error, Result};

/// Compute cosine similarity between two equally sized, non-zero vectors.
///
/// # Errors
///
/// `InvalidVector` if either vector is empty or has zero norm;
/// `DimensionMismatch` if the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Err(Error::InvalidVector("empty vector".to_string()));
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return Err(Error::InvalidVector("zero-norm vector".to_string()));
    }

    Ok(dot / denom)
}

/// Score a response embedding against a reference embedding.
///
/// `floor(max(0, cosine) * 100)`, always in `[0, 100]`.
pub fn understanding_score(reference: &[f32], candidate: &[f32]) -> Result<i64> {
    let similarity = cosine_similarity(reference, candidate)?;
    Ok((similarity.max(0.0) * 100.0).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_100() {
        assert_eq!(understanding_score(&[1.0, 0.0], &[1.0, 0.0]).unwrap(), 100);
        assert_eq!(
            understanding_score(&[0.3, 0.7, 0.1], &[0.3, 0.7, 0.1]).unwrap(),
            100
        );
    }

    #[test]
    fn orthogonal_vectors_score_0() {
        assert_eq!(understanding_score(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0);
    }

    #[test]
    fn opposite_vectors_clamp_to_0() {
        assert_eq!(understanding_score(&[1.0, 0.0], &[-1.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn score_is_always_in_bounds() {
        let pairs: &[(&[f32], &[f32])] = &[
            (&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]),
            (&[0.5, -0.5], &[0.5, 0.5]),
            (&[-1.0, -1.0], &[1.0, 1.0]),
            (&[0.001, 0.002], &[100.0, 200.0]),
        ];
        for (a, b) in pairs {
            let score = understanding_score(a, b).unwrap();
            assert!((0..=100).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn partial_similarity_is_truncated_not_rounded() {
        // cos(45°) ≈ 0.7071 → floor(70.71) = 70
        let score = understanding_score(&[1.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(score, 70);
    }

    #[test]
    fn zero_norm_is_invalid() {
        let err = understanding_score(&[0.0, 0.0], &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidVector(_)));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = understanding_score(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_vectors_are_invalid() {
        let err = understanding_score(&[], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidVector(_)));
    }
}
