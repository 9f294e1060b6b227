use crate::common::error::{FaceGateError, Result};

pub type Embedding = Vec<f32>;

/// Bounded similarity between two equal-length feature vectors.
///
/// Cosine similarity clamped at zero, so identical directions score 1.0 and
/// orthogonal (or opposed) directions score 0.0. A length mismatch is a
/// caller contract violation, not a low-similarity result.
pub fn score_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(FaceGateError::Contract(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(FaceGateError::Contract("empty embedding".into()));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(0.0, 1.0))
}

/// Pure verification predicate over a similarity score.
pub fn verify_match(score: f32, threshold: f32) -> bool {
    score >= threshold
}

/// Element-wise mean of several embeddings, used for fused templates.
pub fn average_embeddings(embeddings: &[Embedding]) -> Embedding {
    if embeddings.is_empty() {
        return vec![];
    }

    let embedding_size = embeddings[0].len();
    let mut averaged = vec![0.0f32; embedding_size];

    for embedding in embeddings {
        for (i, &value) in embedding.iter().enumerate() {
            averaged[i] += value;
        }
    }

    let count = embeddings.len() as f32;
    for value in &mut averaged {
        *value /= count;
    }

    averaged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.3f32, -0.5, 0.8];
        let score = score_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn symmetric() {
        let a = vec![1.0f32, 0.2, 0.0];
        let b = vec![0.4f32, 0.9, 0.1];
        assert_eq!(
            score_similarity(&a, &b).unwrap(),
            score_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let score = score_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn opposed_vectors_floor_at_zero() {
        let score = score_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn dimension_mismatch_is_contract_violation() {
        let result = score_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!(matches!(result, Err(FaceGateError::Contract(_))));
    }

    #[test]
    fn verification_threshold() {
        assert!(verify_match(0.6, 0.6));
        assert!(!verify_match(0.59, 0.6));
    }

    #[test]
    fn averages_embeddings() {
        let fused = average_embeddings(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(fused, vec![0.5, 0.5]);
    }
}
