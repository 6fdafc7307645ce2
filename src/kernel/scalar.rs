//! Scalar reference kernel.

use crate::candidate::nms::nms_sorted_indices;
use crate::candidate::topk::ScoredBox;
use crate::geometry::{self, BBox};
use crate::kernel::BoxKernel;
use ndarray::Array2;

/// Single-threaded kernel; the reference for all other backends.
pub struct ScalarKernel;

impl BoxKernel for ScalarKernel {
    fn iou_matrix(rows: &[BBox], cols: &[BBox]) -> Array2<f32> {
        geometry::iou_matrix(rows, cols)
    }

    fn nms(sorted: &[ScoredBox], iou_thresh: f32, max_keep: usize) -> Vec<usize> {
        nms_sorted_indices(sorted, iou_thresh, max_keep)
    }
}
