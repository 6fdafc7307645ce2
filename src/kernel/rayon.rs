//! Rayon-parallel kernel (feature-gated).
//!
//! IoU matrices are filled row-parallel. NMS keeps the sequential greedy
//! sweep but evaluates the suppression test for all remaining candidates of
//! each kept box in parallel, so the kept set is identical to the scalar one.

use crate::candidate::topk::ScoredBox;
use crate::geometry::{iou, BBox};
use crate::kernel::BoxKernel;
use ndarray::Array2;
use rayon::prelude::*;

/// Row-parallel kernel backed by the global rayon pool.
pub struct RayonKernel;

impl BoxKernel for RayonKernel {
    fn iou_matrix(rows: &[BBox], cols: &[BBox]) -> Array2<f32> {
        let data: Vec<f32> = rows
            .par_iter()
            .flat_map_iter(|a| cols.iter().map(move |b| iou(a, b)))
            .collect();
        let width = cols.len();
        Array2::from_shape_fn((rows.len(), width), |(r, c)| data[r * width + c])
    }

    fn nms(sorted: &[ScoredBox], iou_thresh: f32, max_keep: usize) -> Vec<usize> {
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
            let current = sorted[i].bbox;
            suppressed[i + 1..]
                .par_iter_mut()
                .zip(sorted[i + 1..].par_iter())
                .for_each(|(flag, other)| {
                    if !*flag && iou(&current, &other.bbox) > iou_thresh {
                        *flag = true;
                    }
                });
        }
        keep
    }
}
