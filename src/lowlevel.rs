//! Low-level building blocks for custom detection pipelines.
//!
//! These expose the ranking, suppression and overlap kernels used inside the
//! proposal and detection stages. Most users should prefer the stage types or
//! the `FasterRcnn` facade.

pub use crate::candidate::nms::{nms_boxes, nms_sorted_indices};
pub use crate::candidate::topk::{sort_scored_desc, top_k, ScoredBox};
pub use crate::coder::{default_scale_clip, MIN_EXTENT};
pub use crate::kernel::{BoxKernel, ScalarKernel};
pub use crate::util::math::{sigmoid, softmax_rows};

#[cfg(feature = "rayon")]
pub use crate::kernel::RayonKernel;
