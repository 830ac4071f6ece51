//! Vector similarity utilities.

use factchat_core::memory::IndexRecord;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by cosine similarity to a query embedding.
///
/// Returns `(score, record)` pairs sorted by descending similarity. Records
/// scoring below `min_score` are dropped.
pub fn vector_search<'a>(
    records: &'a [IndexRecord],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<(f32, &'a IndexRecord)> {
    let mut scored: Vec<(f32, &IndexRecord)> = records
        .iter()
        .map(|r| (cosine_similarity(&r.embedding, query_embedding), r))
        .filter(|(sim, _)| *sim >= min_score)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// The single closest record at or above `min_score`.
pub fn best_match<'a>(
    records: &'a [IndexRecord],
    query_embedding: &[f32],
    min_score: f32,
) -> Option<(f32, &'a IndexRecord)> {
    vector_search(records, query_embedding, 1, min_score).into_iter().next()
}
