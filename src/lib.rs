//! frcnn is a CPU-first implementation of the Faster R-CNN geometry core.
//!
//! The crate covers everything between the network heads: anchor tiling,
//! box encoding and clipping, RPN proposal selection, anchor and ROI target
//! assignment with seedable subsampling, and per-class detection NMS. The
//! backbone, ROI pooling and the training loop stay outside; their tensors are
//! exchanged as `ndarray` arrays. IoU and NMS run on a scalar kernel, with
//! optional parallelism via the `rayon` feature.

pub mod anchor;
mod candidate;
pub mod coder;
pub mod data;
pub mod geometry;
pub mod kernel;
pub mod lowlevel;
pub mod pipeline;
pub mod rcnn;
pub mod rpn;
pub(crate) mod trace;
pub mod util;

pub use anchor::{AnchorCache, AnchorConfig, AnchorGenerator};
pub use coder::{clip_box, BoxCoder};
pub use data::{gt_boxes, pad_to_max, roi_batch_array, GroundTruth};
pub use geometry::{iou, iou_matrix, BBox, CenterBox, ImageInfo};
pub use pipeline::{FasterRcnn, FrcnnConfig, RcnnBatch, RoiMode};
pub use rcnn::{
    Detection, Detections, DetectorConfig, RcnnDetector, RcnnSamplerConfig, RcnnTargetConfig,
    RcnnTargetGenerator, RcnnTargetSampler, RcnnTargets, RegressionTarget, RoiSample, RoiSamples,
    SampleKind,
};
pub use rpn::{
    AnchorLabel, Proposal, ProposalConfig, ProposalGenerator, RpnHeadOutput, RpnTargetConfig,
    RpnTargetGenerator, RpnTargetMaps, RpnTargets, ScoreActivation,
};
pub use util::{FrcnnError, FrcnnResult};
