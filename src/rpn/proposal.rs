//! Proposal generation from per-anchor scores and deltas.
//!
//! Candidates are decoded against their anchors, clipped, filtered by a
//! minimum size in original-image units, ranked, reduced to the pre-NMS top-K,
//! suppressed greedily and finally truncated or padded to exactly the
//! post-NMS top-K.

use crate::candidate::topk::{top_k, ScoredBox};
use crate::coder::{clip_box, BoxCoder};
use crate::geometry::{BBox, ImageInfo};
use crate::kernel;
use crate::rpn::RpnHeadOutput;
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{ArrayView1, ArrayView2};

/// Proposal stage parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProposalConfig {
    /// Candidates kept after ranking, before NMS.
    pub pre_nms_topk: usize,
    /// Exact number of proposals returned per image.
    pub post_nms_topk: usize,
    /// IoU above which a lower-scoring candidate is suppressed.
    pub nms_thresh: f32,
    /// Minimum width and height in original-image pixels.
    pub min_size: f32,
    /// Standard deviations the RPN deltas were normalized with.
    pub stds: [f32; 4],
    /// Use the parallel kernel when available.
    pub parallel: bool,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            pre_nms_topk: 6000,
            post_nms_topk: 300,
            nms_thresh: 0.7,
            min_size: 16.0,
            stds: [1.0; 4],
            parallel: false,
        }
    }
}

impl ProposalConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.pre_nms_topk == 0 {
            return Err(FrcnnError::config("proposal.pre_nms_topk", "must be > 0"));
        }
        if self.post_nms_topk == 0 {
            return Err(FrcnnError::config("proposal.post_nms_topk", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.nms_thresh) {
            return Err(FrcnnError::config("proposal.nms_thresh", "must be in [0, 1]"));
        }
        if !self.min_size.is_finite() || self.min_size < 0.0 {
            return Err(FrcnnError::config("proposal.min_size", "must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Candidate region of interest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proposal {
    /// Decoded box clipped to the image.
    pub bbox: BBox,
    /// Foreground probability.
    pub score: f32,
    /// Anchor the proposal was decoded from; `None` for padding.
    pub anchor: Option<usize>,
}

impl Proposal {
    /// Zero-score, zero-area filler used when too few proposals survive.
    pub const fn padding() -> Self {
        Self {
            bbox: BBox::new(0.0, 0.0, 0.0, 0.0),
            score: 0.0,
            anchor: None,
        }
    }

    pub fn is_padding(&self) -> bool {
        self.anchor.is_none()
    }
}

/// Boxes of a proposal slice, padding included.
pub fn proposal_boxes(proposals: &[Proposal]) -> Vec<BBox> {
    proposals.iter().map(|p| p.bbox).collect()
}

/// Turns RPN outputs into a fixed-size list of proposals.
#[derive(Clone, Debug)]
pub struct ProposalGenerator {
    cfg: ProposalConfig,
    coder: BoxCoder,
}

impl ProposalGenerator {
    pub fn new(cfg: ProposalConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        let coder = BoxCoder::new(cfg.stds)?;
        Ok(Self { cfg, coder })
    }

    pub fn config(&self) -> &ProposalConfig {
        &self.cfg
    }

    /// Generates proposals from head outputs already in anchor order.
    pub fn generate_from_head(
        &self,
        head: &RpnHeadOutput,
        anchors: &[BBox],
        im_info: &ImageInfo,
    ) -> FrcnnResult<Vec<Proposal>> {
        self.generate(head.scores.view(), head.deltas.view(), anchors, im_info)
    }

    /// Generates exactly `post_nms_topk` proposals for one image.
    ///
    /// `scores` holds one foreground probability per anchor and `deltas` one
    /// `(dx, dy, dw, dh)` row per anchor.
    pub fn generate(
        &self,
        scores: ArrayView1<'_, f32>,
        deltas: ArrayView2<'_, f32>,
        anchors: &[BBox],
        im_info: &ImageInfo,
    ) -> FrcnnResult<Vec<Proposal>> {
        let n = anchors.len();
        if scores.len() != n {
            return Err(FrcnnError::shape("rpn_cls_prob", format!("({n},)"), scores.shape()));
        }
        if deltas.dim() != (n, 4) {
            return Err(FrcnnError::shape("rpn_bbox_pred", format!("({n}, 4)"), deltas.shape()));
        }

        let _span = trace_span!("proposal", anchors = n).entered();
        let min_size = self.cfg.min_size * im_info.scale;

        let mut candidates = Vec::with_capacity(n);
        for (idx, anchor) in anchors.iter().enumerate() {
            let score = scores[idx];
            if !score.is_finite() {
                continue;
            }
            let delta = [
                deltas[[idx, 0]],
                deltas[[idx, 1]],
                deltas[[idx, 2]],
                deltas[[idx, 3]],
            ];
            let decoded = self.coder.decode(delta, anchor);
            let clipped = clip_box(&decoded, im_info.height, im_info.width);
            if clipped.width() < min_size || clipped.height() < min_size {
                continue;
            }
            candidates.push(ScoredBox::new(clipped, score, idx));
        }
        trace_event!("proposal_candidates", kept = candidates.len());

        let ranked = top_k(candidates, self.cfg.pre_nms_topk);
        let keep = kernel::nms(
            &ranked,
            self.cfg.nms_thresh,
            self.cfg.post_nms_topk,
            self.cfg.parallel,
        );

        let mut out: Vec<Proposal> = keep
            .into_iter()
            .map(|i| Proposal {
                bbox: ranked[i].bbox,
                score: ranked[i].score,
                anchor: Some(ranked[i].index),
            })
            .collect();
        let survivors = out.len();
        if survivors < self.cfg.post_nms_topk {
            trace_debug!("proposal_padding", survivors = survivors, padded = self.cfg.post_nms_topk - survivors);
            out.resize(self.cfg.post_nms_topk, Proposal::padding());
        }
        trace_event!("proposals", survivors = survivors, total = out.len());
        Ok(out)
    }
}
