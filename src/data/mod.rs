//! Per-image inputs: ground-truth annotations and batch assembly.

mod batch;
mod gt;

pub use batch::{pad_to_max, roi_batch_array, MAX_PAD_RANK};
pub use gt::{gt_boxes, GroundTruth};
