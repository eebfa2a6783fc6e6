use ndarray::Array1;

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

/// Highest similarity between `query` and any of `references`. Both sides are unit vectors,
/// so the dot product is the cosine similarity. References of the wrong length are skipped.
pub(crate) fn max_similarity(query: &Array1<f32>, references: &[Array1<f32>]) -> Option<f32> {
    references
        .iter()
        .filter(|r| r.len() == query.len())
        .map(|r| query.dot(r))
        .filter(|s| !s.is_nan())
        .max_by(|a, b| a.total_cmp(b))
}
