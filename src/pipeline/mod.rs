//! Two-stage detector facade.
//!
//! [`FasterRcnn`] validates a [`FrcnnConfig`] once and wires the stages
//! together for one image at a time: anchors for the RPN grid, proposals from
//! RPN head maps, anchor and ROI training targets, and final detections. All
//! methods take `&self`, so one instance can serve images on several threads.

mod config;

pub use config::{FrcnnConfig, RoiMode};

use crate::anchor::{AnchorCache, AnchorGenerator};
use crate::data::{gt_boxes, GroundTruth};
use crate::geometry::{BBox, ImageInfo};
use crate::rcnn::{
    Detections, RcnnDetector, RcnnTargetGenerator, RcnnTargetSampler, RcnnTargets, RoiSamples,
};
use crate::rpn::{
    proposal_boxes, Proposal, ProposalGenerator, RpnHeadOutput, RpnTargetGenerator, RpnTargetMaps,
};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{ArrayView2, ArrayView3};
use rand::Rng;
use std::sync::Arc;

/// Sampled ROIs with their targets.
#[derive(Clone, Debug, PartialEq)]
pub struct RcnnBatch {
    /// Fixed-size ROI batch.
    pub samples: RoiSamples,
    /// Labels and regression targets aligned with `samples`.
    pub targets: RcnnTargets,
}

impl RcnnBatch {
    pub fn rois(&self) -> Vec<BBox> {
        self.samples.rois()
    }
}

/// Faster R-CNN geometry pipeline for single images.
#[derive(Debug)]
pub struct FasterRcnn {
    cfg: FrcnnConfig,
    anchors: AnchorCache,
    proposals: ProposalGenerator,
    rpn_targets: RpnTargetGenerator,
    sampler: RcnnTargetSampler,
    rcnn_targets: RcnnTargetGenerator,
    detector: RcnnDetector,
}

impl FasterRcnn {
    pub fn new(cfg: FrcnnConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        Ok(Self {
            anchors: AnchorCache::new(AnchorGenerator::new(&cfg.anchor)?),
            proposals: ProposalGenerator::new(cfg.proposal.clone())?,
            rpn_targets: RpnTargetGenerator::new(cfg.rpn_target.clone())?,
            sampler: RcnnTargetSampler::new(cfg.rcnn_sampler.clone())?,
            rcnn_targets: RcnnTargetGenerator::new(cfg.rcnn_target.clone())?,
            detector: RcnnDetector::new(cfg.detector.clone())?,
            cfg,
        })
    }

    pub fn config(&self) -> &FrcnnConfig {
        &self.cfg
    }

    pub fn roi_mode(&self) -> RoiMode {
        self.cfg.roi_mode
    }

    pub fn spatial_scale(&self) -> f32 {
        self.cfg.spatial_scale()
    }

    /// Anchors of an RPN feature grid, cached per shape.
    pub fn anchors(&self, height: usize, width: usize) -> Arc<[BBox]> {
        self.anchors.get(height, width)
    }

    /// Proposals from `(A, H, W)` classification and `(4A, H, W)` regression maps.
    pub fn propose(
        &self,
        rpn_cls: ArrayView3<'_, f32>,
        rpn_reg: ArrayView3<'_, f32>,
        im_info: &ImageInfo,
    ) -> FrcnnResult<Vec<Proposal>> {
        let (num_base, height, width) = rpn_cls.dim();
        let expected = self.anchors.generator().num_base();
        if num_base != expected {
            return Err(FrcnnError::shape(
                "rpn_cls",
                format!("({expected}, H, W)"),
                rpn_cls.shape(),
            ));
        }
        let head = RpnHeadOutput::from_feature_maps(rpn_cls, rpn_reg, self.cfg.rpn_activation)?;
        let anchors = self.anchors(height, width);
        self.proposals.generate_from_head(&head, &anchors, im_info)
    }

    /// Anchor targets for an `height x width` RPN grid, in head layout.
    pub fn rpn_targets<R: Rng + ?Sized>(
        &self,
        height: usize,
        width: usize,
        gt: &[GroundTruth],
        im_info: &ImageInfo,
        rng: &mut R,
    ) -> FrcnnResult<RpnTargetMaps> {
        let anchors = self.anchors(height, width);
        let targets = self
            .rpn_targets
            .generate(&anchors, &gt_boxes(gt), im_info, rng);
        targets.to_feature_maps(height, width)
    }

    /// Samples a fixed-size ROI batch from proposals and builds its targets.
    pub fn rcnn_targets<R: Rng + ?Sized>(
        &self,
        proposals: &[Proposal],
        gt: &[GroundTruth],
        rng: &mut R,
    ) -> FrcnnResult<RcnnBatch> {
        self.rcnn_targets.check_classes(gt)?;
        let samples = self.sampler.sample(&proposal_boxes(proposals), gt, rng);
        let targets = self.rcnn_targets.generate(&samples, gt)?;
        Ok(RcnnBatch { samples, targets })
    }

    /// Detections from class probabilities `(N, C)` and deltas `(N, 4C)`.
    pub fn detect(
        &self,
        rois: &[BBox],
        cls_prob: ArrayView2<'_, f32>,
        bbox_pred: ArrayView2<'_, f32>,
        im_info: &ImageInfo,
    ) -> FrcnnResult<Detections> {
        self.detector.detect(rois, cls_prob, bbox_pred, im_info)
    }

    /// Detections from raw class logits.
    pub fn detect_logits(
        &self,
        rois: &[BBox],
        cls_logits: ArrayView2<'_, f32>,
        bbox_pred: ArrayView2<'_, f32>,
        im_info: &ImageInfo,
    ) -> FrcnnResult<Detections> {
        self.detector
            .detect_logits(rois, cls_logits, bbox_pred, im_info)
    }
}
