// crates/search/src/rrf.rs
//! Reciprocal-rank fusion, constant k=60. A document present in only one
//! input list scores `1 / (60 + rank)`; present in both, the scores sum.

use std::collections::HashMap;

pub const RRF_K: f64 = 60.0;

/// Fuse two ranked id lists (0-based rank, best first) into a single
/// descending-by-score ordering. Ties are broken by the order ids first
/// appear across `full_text` then `vector`, which is stable for equal
/// scores.
pub fn reciprocal_rank_fusion(full_text: &[String], vector: &[String]) -> Vec<(String, f64)> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (rank, id) in full_text.iter().enumerate() {
        let entry = scores.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            0.0
        });
        *entry += 1.0 / (RRF_K + rank as f64 + 1.0);
    }
    for (rank, id) in vector.iter().enumerate() {
        let entry = scores.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            0.0
        });
        *entry += 1.0 / (RRF_K + rank as f64 + 1.0);
    }

    let mut fused: Vec<(String, f64)> = order.into_iter().map(|id| {
        let score = scores[&id];
        (id, score)
    }).collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_in_only_one_list_scores_one_over_k_plus_rank() {
        let full_text = vec!["a".to_string(), "b".to_string()];
        let vector: Vec<String> = vec![];
        let fused = reciprocal_rank_fusion(&full_text, &vector);
        let a_score = fused.iter().find(|(id, _)| id == "a").unwrap().1;
        assert!((a_score - 1.0 / (RRF_K + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn document_in_both_lists_scores_the_sum() {
        let full_text = vec!["a".to_string()];
        let vector = vec!["a".to_string()];
        let fused = reciprocal_rank_fusion(&full_text, &vector);
        let expected = 1.0 / (RRF_K + 1.0) + 1.0 / (RRF_K + 1.0);
        assert!((fused[0].1 - expected).abs() < 1e-9);
    }

    #[test]
    fn fused_list_is_sorted_descending() {
        let full_text = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vector = vec!["c".to_string()];
        let fused = reciprocal_rank_fusion(&full_text, &vector);
        for pair in fused.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(fused[0].0, "c");
    }

    #[test]
    fn empty_lists_produce_empty_result() {
        assert!(reciprocal_rank_fusion(&[], &[]).is_empty());
    }
}
