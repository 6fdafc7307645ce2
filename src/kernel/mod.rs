//! Overlap and suppression kernels.
//!
//! Every IoU matrix and NMS sweep in the crate goes through [`BoxKernel`].
//! `ScalarKernel` is the reference; `RayonKernel` (feature `rayon`) must
//! return identical results. Other backends (batched, accelerator) plug in
//! by implementing the same trait.

use crate::candidate::topk::ScoredBox;
use crate::geometry::BBox;
use ndarray::Array2;

/// Kernel trait for pairwise overlap and greedy suppression.
pub trait BoxKernel {
    /// Dense `(rows.len(), cols.len())` IoU matrix.
    fn iou_matrix(rows: &[BBox], cols: &[BBox]) -> Array2<f32>;

    /// Greedy NMS over candidates sorted by descending score.
    ///
    /// Returns positions into `sorted` of kept boxes, at most `max_keep`.
    fn nms(sorted: &[ScoredBox], iou_thresh: f32, max_keep: usize) -> Vec<usize>;
}

pub mod scalar;

#[cfg(feature = "rayon")]
pub mod rayon;

pub use scalar::ScalarKernel;

#[cfg(feature = "rayon")]
pub use self::rayon::RayonKernel;

/// IoU matrix on the backend selected by `parallel`.
///
/// Falls back to the scalar kernel when the `rayon` feature is disabled.
pub(crate) fn iou_matrix(rows: &[BBox], cols: &[BBox], parallel: bool) -> Array2<f32> {
    #[cfg(feature = "rayon")]
    if parallel {
        return <RayonKernel as BoxKernel>::iou_matrix(rows, cols);
    }
    let _ = parallel;
    <ScalarKernel as BoxKernel>::iou_matrix(rows, cols)
}

/// NMS on the backend selected by `parallel`.
pub(crate) fn nms(sorted: &[ScoredBox], iou_thresh: f32, max_keep: usize, parallel: bool) -> Vec<usize> {
    #[cfg(feature = "rayon")]
    if parallel {
        return <RayonKernel as BoxKernel>::nms(sorted, iou_thresh, max_keep);
    }
    let _ = parallel;
    <ScalarKernel as BoxKernel>::nms(sorted, iou_thresh, max_keep)
}
