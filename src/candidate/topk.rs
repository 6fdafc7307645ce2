//! Score ordering and top-K selection for scored boxes.

use crate::geometry::BBox;
use std::cmp::Ordering;

/// Box with a confidence score and its index in the originating sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredBox {
    /// Candidate box.
    pub bbox: BBox,
    /// Ranking score.
    pub score: f32,
    /// Position in the input (anchor, roi); breaks score ties.
    pub index: usize,
}

impl ScoredBox {
    pub fn new(bbox: BBox, score: f32, index: usize) -> Self {
        Self { bbox, score, index }
    }
}

fn scored_cmp_desc(a: &ScoredBox, b: &ScoredBox) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

/// Sorts by descending score; equal scores keep input order.
pub fn sort_scored_desc(items: &mut [ScoredBox]) {
    items.sort_by(scored_cmp_desc);
}

/// Keeps the `k` highest-scoring items, sorted by descending score.
pub fn top_k(mut items: Vec<ScoredBox>, k: usize) -> Vec<ScoredBox> {
    if k == 0 {
        return Vec::new();
    }
    if items.len() > k {
        items.select_nth_unstable_by(k - 1, scored_cmp_desc);
        items.truncate(k);
    }
    sort_scored_desc(&mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::{sort_scored_desc, top_k, ScoredBox};
    use crate::geometry::BBox;

    fn item(score: f32, index: usize) -> ScoredBox {
        ScoredBox::new(BBox::new(0.0, 0.0, 1.0, 1.0), score, index)
    }

    #[test]
    fn ties_break_by_input_order() {
        let mut items = vec![item(0.5, 2), item(0.9, 3), item(0.5, 0), item(0.5, 1)];
        sort_scored_desc(&mut items);
        let order: Vec<usize> = items.iter().map(|i| i.index).collect();
        assert_eq!(order, vec![3, 0, 1, 2]);
    }

    #[test]
    fn top_k_keeps_highest() {
        let items: Vec<ScoredBox> = (0..10).map(|i| item((i % 4) as f32, i)).collect();
        let kept = top_k(items, 3);
        let order: Vec<usize> = kept.iter().map(|i| i.index).collect();
        assert_eq!(order, vec![3, 7, 2]);
        assert!(top_k(vec![item(1.0, 0)], 0).is_empty());
    }
}
