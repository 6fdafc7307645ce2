//! Greedy non-maximum suppression over scored boxes.

use crate::candidate::topk::{sort_scored_desc, ScoredBox};
use crate::geometry::iou;

/// Greedy NMS over candidates already sorted by descending score.
///
/// Returns positions into `sorted` of kept boxes, in score order. A box is
/// suppressed when its IoU with an already kept box exceeds `iou_thresh`.
/// Stops once `max_keep` boxes are kept.
pub fn nms_sorted_indices(sorted: &[ScoredBox], iou_thresh: f32, max_keep: usize) -> Vec<usize> {
    let mut keep = Vec::new();
    if max_keep == 0 {
        return keep;
    }
    let mut suppressed = vec![false; sorted.len()];
    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        if keep.len() >= max_keep {
            break;
        }
        let current = &sorted[i].bbox;
        for (j, other) in sorted.iter().enumerate().skip(i + 1) {
            if !suppressed[j] && iou(current, &other.bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Sorts `candidates` by descending score and returns the boxes surviving NMS.
pub fn nms_boxes(candidates: &mut [ScoredBox], iou_thresh: f32, max_keep: usize) -> Vec<ScoredBox> {
    sort_scored_desc(candidates);
    nms_sorted_indices(candidates, iou_thresh, max_keep)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}
