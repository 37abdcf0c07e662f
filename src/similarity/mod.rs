// Similarity measures for taste vectors.
//
// Cosine similarity compares weighted vectors: a shared artist matters more
// the more both people play it. Jaccard similarity is presence-only and is
// kept as a secondary diagnostic alongside the cosine scores.

pub mod vector;

use std::collections::HashSet;
use std::hash::Hash;

pub use vector::TasteVector;

/// Cosine similarity between two sparse vectors.
///
/// Missing keys count as weight 0. Returns 0.0 when either vector has zero
/// norm, otherwise dot(a, b) / (|a| * |b|). Weights are non-negative, so the
/// result lies in 0.0 to 1.0; it is clamped to absorb rounding drift.
pub fn cosine_similarity(a: &TasteVector, b: &TasteVector) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Keys only in `b` contribute 0 to the dot product, so iterating `a`
    // covers the whole union.
    let dot: f64 = a.iter().map(|(key, weight)| weight * b.weight(key)).sum();

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Jaccard similarity |A ∩ B| / |A ∪ B|, defined as 0.0 when both sets are empty.
pub fn jaccard_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Jaccard similarity over the key sets of two vectors.
pub fn key_jaccard(a: &TasteVector, b: &TasteVector) -> f64 {
    jaccard_similarity(&a.key_set(), &b.key_set())
}
