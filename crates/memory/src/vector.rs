//! Vector similarity over the encoded chunk index.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the widths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank `vectors` against `query`.
///
/// Returns `(position, score)` pairs sorted by descending score, keeping only
/// scores strictly above `min_score`, at most `limit` of them. Ties keep
/// index order.
pub fn rank_by_similarity<'a, I>(vectors: I, query: &[f32], limit: usize, min_score: f32) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(usize, f32)> = vectors
        .into_iter()
        .enumerate()
        .filter_map(|(pos, v)| {
            let sim = cosine_similarity(v, query);
            (sim > min_score).then_some((pos, sim))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(v: &[Vec<f32>]) -> impl Iterator<Item = &[f32]> {
        v.iter().map(Vec::as_slice)
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // 1 / sqrt(2)
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn ranks_by_similarity() {
        let index = vec![
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.5, 0.5, 0.0],
        ];
        let ranked = rank_by_similarity(rows(&index), &[1.0, 0.0, 0.0], 10, 0.0);
        let order: Vec<usize> = ranked.iter().map(|(pos, _)| *pos).collect();
        // the orthogonal row scores exactly 0.0 and is dropped
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn min_score_is_exclusive() {
        let index = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let ranked = rank_by_similarity(rows(&index), &[1.0, 0.0], 10, 1.0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn respects_limit() {
        let index: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32 * 0.1]).collect();
        let ranked = rank_by_similarity(rows(&index), &[1.0, 0.0], 3, 0.0);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 0);
    }
}
