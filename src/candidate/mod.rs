//! Candidate ranking and pruning.
//!
//! Includes deterministic score ordering, top-K selection and greedy
//! IoU-based non-maximum suppression.

pub(crate) mod nms;
pub(crate) mod topk;
