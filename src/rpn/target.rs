//! Anchor-level training targets for the RPN.
//!
//! Labelling runs in three passes over the anchor/ground-truth IoU matrix:
//! anchors whose best IoU is below the negative threshold become background,
//! the best anchors of every ground-truth box are forced to foreground, and
//! anchors whose best IoU reaches the positive threshold become foreground.
//! Foreground and background are then subsampled with the injected RNG so at
//! most `num_sample` anchors contribute to the loss.

use crate::coder::BoxCoder;
use crate::geometry::{BBox, ImageInfo};
use crate::kernel;
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array1, Array2, Array3};
use rand::seq::SliceRandom;
use rand::Rng;

/// Anchor assignment outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorLabel {
    /// Excluded from the loss.
    Ignore,
    Background,
    Foreground,
}

impl AnchorLabel {
    /// Numeric label: -1 ignore, 0 background, 1 foreground.
    pub fn as_i32(self) -> i32 {
        match self {
            AnchorLabel::Ignore => -1,
            AnchorLabel::Background => 0,
            AnchorLabel::Foreground => 1,
        }
    }
}

/// RPN target assignment parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RpnTargetConfig {
    /// Maximum number of labelled (non-ignored) anchors.
    pub num_sample: usize,
    /// Best IoU at or above which an anchor is foreground.
    pub pos_iou_thresh: f32,
    /// Best IoU below which an anchor is background.
    pub neg_iou_thresh: f32,
    /// Foreground share of `num_sample`.
    pub pos_ratio: f32,
    /// Regression target normalisation.
    pub stds: [f32; 4],
    /// Pixels an anchor may extend past the image before it is ignored;
    /// `None` keeps every anchor. The best anchors of each gt box are kept
    /// regardless.
    pub allowed_border: Option<f32>,
    /// Use the parallel kernel for the IoU matrix.
    pub parallel: bool,
}

impl Default for RpnTargetConfig {
    fn default() -> Self {
        Self {
            num_sample: 256,
            pos_iou_thresh: 0.7,
            neg_iou_thresh: 0.3,
            pos_ratio: 0.5,
            stds: [1.0; 4],
            allowed_border: None,
            parallel: false,
        }
    }
}

impl RpnTargetConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.num_sample == 0 {
            return Err(FrcnnError::config("rpn_target.num_sample", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.pos_iou_thresh) {
            return Err(FrcnnError::config("rpn_target.pos_iou_thresh", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.neg_iou_thresh) {
            return Err(FrcnnError::config("rpn_target.neg_iou_thresh", "must be in [0, 1]"));
        }
        if self.neg_iou_thresh > self.pos_iou_thresh {
            return Err(FrcnnError::config(
                "rpn_target.neg_iou_thresh",
                "must not exceed pos_iou_thresh",
            ));
        }
        if !(0.0..=1.0).contains(&self.pos_ratio) {
            return Err(FrcnnError::config("rpn_target.pos_ratio", "must be in [0, 1]"));
        }
        if let Some(border) = self.allowed_border {
            if !border.is_finite() || border < 0.0 {
                return Err(FrcnnError::config(
                    "rpn_target.allowed_border",
                    "must be finite and >= 0",
                ));
            }
        }
        Ok(())
    }

    /// Foreground cap, `floor(num_sample * pos_ratio)`.
    pub fn max_foreground(&self) -> usize {
        (self.num_sample as f32 * self.pos_ratio).floor() as usize
    }
}

/// Per-anchor targets in anchor order.
#[derive(Clone, Debug, PartialEq)]
pub struct RpnTargets {
    /// One label per anchor.
    pub labels: Vec<AnchorLabel>,
    /// Ground-truth index each foreground anchor regresses to.
    pub matches: Vec<Option<usize>>,
    /// `(N, 4)` encoded deltas, zero outside the foreground.
    pub box_targets: Array2<f32>,
    /// `(N, 4)` loss weights, one for foreground anchors.
    pub box_masks: Array2<f32>,
}

/// Targets laid out like the RPN head maps.
#[derive(Clone, Debug, PartialEq)]
pub struct RpnTargetMaps {
    /// `(A, H, W)`, 1 foreground and 0 otherwise.
    pub cls_target: Array3<f32>,
    /// `(A, H, W)`, 1 where the label is not ignored.
    pub cls_mask: Array3<f32>,
    /// `(4A, H, W)`.
    pub box_target: Array3<f32>,
    /// `(4A, H, W)`.
    pub box_mask: Array3<f32>,
}

impl RpnTargets {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_foreground(&self) -> usize {
        self.count(AnchorLabel::Foreground)
    }

    pub fn num_background(&self) -> usize {
        self.count(AnchorLabel::Background)
    }

    fn count(&self, label: AnchorLabel) -> usize {
        self.labels.iter().filter(|l| **l == label).count()
    }

    /// Classification target (`max(label, 0)`) and mask (`label >= 0`).
    pub fn cls_target_and_mask(&self) -> (Array1<f32>, Array1<f32>) {
        let target = self
            .labels
            .iter()
            .map(|l| l.as_i32().max(0) as f32)
            .collect();
        let mask = self
            .labels
            .iter()
            .map(|l| if *l == AnchorLabel::Ignore { 0.0 } else { 1.0 })
            .collect();
        (target, mask)
    }

    /// Reshapes targets to `(A, H, W)` / `(4A, H, W)` maps for a feature grid.
    pub fn to_feature_maps(&self, height: usize, width: usize) -> FrcnnResult<RpnTargetMaps> {
        let cells = height * width;
        let n = self.labels.len();
        if cells == 0 || n % cells != 0 {
            return Err(FrcnnError::shape(
                "rpn_targets",
                format!("a multiple of {height} x {width} anchors"),
                &[n],
            ));
        }
        let num_base = n / cells;
        let (cls_flat, mask_flat) = self.cls_target_and_mask();

        let mut cls_target = Array3::<f32>::zeros((num_base, height, width));
        let mut cls_mask = Array3::<f32>::zeros((num_base, height, width));
        let mut box_target = Array3::<f32>::zeros((4 * num_base, height, width));
        let mut box_mask = Array3::<f32>::zeros((4 * num_base, height, width));
        for h in 0..height {
            for w in 0..width {
                for a in 0..num_base {
                    let idx = (h * width + w) * num_base + a;
                    cls_target[[a, h, w]] = cls_flat[idx];
                    cls_mask[[a, h, w]] = mask_flat[idx];
                    for k in 0..4 {
                        box_target[[4 * a + k, h, w]] = self.box_targets[[idx, k]];
                        box_mask[[4 * a + k, h, w]] = self.box_masks[[idx, k]];
                    }
                }
            }
        }
        Ok(RpnTargetMaps {
            cls_target,
            cls_mask,
            box_target,
            box_mask,
        })
    }
}

/// Assigns labels and regression targets to anchors.
#[derive(Clone, Debug)]
pub struct RpnTargetGenerator {
    cfg: RpnTargetConfig,
    coder: BoxCoder,
}

impl RpnTargetGenerator {
    pub fn new(cfg: RpnTargetConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        let coder = BoxCoder::new(cfg.stds)?;
        Ok(Self { cfg, coder })
    }

    pub fn config(&self) -> &RpnTargetConfig {
        &self.cfg
    }

    fn is_inside(&self, anchor: &BBox, im_info: &ImageInfo) -> bool {
        match self.cfg.allowed_border {
            None => true,
            Some(border) => {
                anchor.x1 >= -border
                    && anchor.y1 >= -border
                    && anchor.x2 <= im_info.width + border
                    && anchor.y2 <= im_info.height + border
            }
        }
    }

    /// Labels `anchors` against ground-truth boxes of one image.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        anchors: &[BBox],
        gt: &[BBox],
        im_info: &ImageInfo,
        rng: &mut R,
    ) -> RpnTargets {
        let _span = trace_span!("rpn_target", anchors = anchors.len(), gt = gt.len()).entered();
        let n = anchors.len();
        let mut labels = vec![AnchorLabel::Ignore; n];
        let mut matches: Vec<Option<usize>> = vec![None; n];
        let mut forced = vec![false; n];

        let inside: Vec<bool> = anchors.iter().map(|a| self.is_inside(a, im_info)).collect();

        if gt.is_empty() {
            for i in (0..n).filter(|&i| inside[i]) {
                labels[i] = AnchorLabel::Background;
            }
        } else {
            let ious = kernel::iou_matrix(anchors, gt, self.cfg.parallel);

            let best: Vec<(f32, usize)> = ious
                .rows()
                .into_iter()
                .map(|row| {
                    let mut best = (f32::NEG_INFINITY, 0usize);
                    for (j, &v) in row.iter().enumerate() {
                        if v > best.0 {
                            best = (v, j);
                        }
                    }
                    best
                })
                .collect();

            for i in (0..n).filter(|&i| inside[i]) {
                if best[i].0 < self.cfg.neg_iou_thresh {
                    labels[i] = AnchorLabel::Background;
                }
            }

            // Best anchors of a gt box are forced even when they cross the border.
            for (j, col) in ious.columns().into_iter().enumerate() {
                let gt_best = col.iter().copied().fold(0.0f32, f32::max);
                if gt_best <= 0.0 {
                    continue;
                }
                for (i, &v) in col.iter().enumerate() {
                    if v == gt_best {
                        labels[i] = AnchorLabel::Foreground;
                        matches[i] = Some(j);
                        forced[i] = true;
                    }
                }
            }

            for i in (0..n).filter(|&i| inside[i]) {
                if best[i].0 >= self.cfg.pos_iou_thresh {
                    labels[i] = AnchorLabel::Foreground;
                    matches[i] = Some(best[i].1);
                }
            }
        }

        self.subsample(&mut labels, &mut matches, &forced, rng);

        let mut box_targets = Array2::<f32>::zeros((n, 4));
        let mut box_masks = Array2::<f32>::zeros((n, 4));
        for i in 0..n {
            if labels[i] != AnchorLabel::Foreground {
                continue;
            }
            if let Some(j) = matches[i] {
                let delta = self.coder.encode(&gt[j], &anchors[i]);
                for k in 0..4 {
                    box_targets[[i, k]] = delta[k];
                    box_masks[[i, k]] = 1.0;
                }
            }
        }

        let targets = RpnTargets {
            labels,
            matches,
            box_targets,
            box_masks,
        };
        trace_event!(
            "rpn_targets",
            inside = inside.iter().filter(|&&b| b).count(),
            foreground = targets.num_foreground(),
            background = targets.num_background()
        );
        targets
    }

    fn subsample<R: Rng + ?Sized>(
        &self,
        labels: &mut [AnchorLabel],
        matches: &mut [Option<usize>],
        forced: &[bool],
        rng: &mut R,
    ) {
        let max_fg = self.cfg.max_foreground();
        let (mut forced_fg, mut plain_fg): (Vec<usize>, Vec<usize>) = (0..labels.len())
            .filter(|&i| labels[i] == AnchorLabel::Foreground)
            .partition(|&i| forced[i]);
        let num_fg = forced_fg.len() + plain_fg.len();
        if num_fg > max_fg {
            // Threshold-only foreground goes first so each gt keeps its best anchor.
            plain_fg.shuffle(rng);
            forced_fg.shuffle(rng);
            for &i in plain_fg.iter().chain(forced_fg.iter()).take(num_fg - max_fg) {
                labels[i] = AnchorLabel::Ignore;
                matches[i] = None;
            }
            trace_debug!("rpn_fg_subsampled", found = num_fg, kept = max_fg);
        }

        let kept_fg = num_fg.min(max_fg);
        let max_bg = self.cfg.num_sample.saturating_sub(kept_fg);
        let mut bg: Vec<usize> = (0..labels.len())
            .filter(|&i| labels[i] == AnchorLabel::Background)
            .collect();
        if bg.len() > max_bg {
            bg.shuffle(rng);
            for &i in bg.iter().take(bg.len() - max_bg) {
                labels[i] = AnchorLabel::Ignore;
            }
            trace_debug!("rpn_bg_subsampled", found = bg.len(), kept = max_bg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorLabel, RpnTargetConfig, RpnTargetGenerator};
    use crate::geometry::{BBox, ImageInfo};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn info() -> ImageInfo {
        ImageInfo::new(100.0, 100.0, 1.0).unwrap()
    }

    #[test]
    fn forces_best_anchor_below_threshold() {
        let gen = RpnTargetGenerator::new(RpnTargetConfig::default()).unwrap();
        let anchors = vec![
            BBox::new(0.0, 0.0, 20.0, 20.0),
            BBox::new(50.0, 50.0, 70.0, 70.0),
        ];
        // IoU with anchor 0 is 0.25, below both thresholds.
        let gt = vec![BBox::new(0.0, 0.0, 10.0, 10.0)];
        let mut rng = StdRng::seed_from_u64(0);
        let t = gen.generate(&anchors, &gt, &info(), &mut rng);
        assert_eq!(t.labels[0], AnchorLabel::Foreground);
        assert_eq!(t.matches[0], Some(0));
        assert_eq!(t.labels[1], AnchorLabel::Background);
        assert_eq!(t.box_masks.row(0).to_vec(), vec![1.0; 4]);
        assert_eq!(t.box_masks.row(1).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn between_thresholds_is_ignored() {
        let gen = RpnTargetGenerator::new(RpnTargetConfig::default()).unwrap();
        let gt = vec![BBox::new(0.0, 0.0, 10.0, 10.0)];
        let anchors = vec![
            BBox::new(0.0, 0.0, 10.0, 10.0),
            // IoU 0.5 with the gt box
            BBox::new(0.0, 0.0, 10.0, 20.0),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let t = gen.generate(&anchors, &gt, &info(), &mut rng);
        assert_eq!(t.labels[0], AnchorLabel::Foreground);
        assert_eq!(t.labels[1], AnchorLabel::Ignore);
    }

    fn border_generator() -> RpnTargetGenerator {
        RpnTargetGenerator::new(RpnTargetConfig {
            allowed_border: Some(0.0),
            ..RpnTargetConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn cross_boundary_anchors_are_ignored() {
        let gt = vec![BBox::new(0.0, 0.0, 10.0, 10.0)];
        let anchors = vec![
            BBox::new(-5.0, -5.0, 10.0, 10.0),
            BBox::new(40.0, 40.0, 50.0, 50.0),
            BBox::new(0.0, 0.0, 10.0, 10.0),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let t = border_generator().generate(&anchors, &gt, &info(), &mut rng);
        assert_eq!(t.labels[0], AnchorLabel::Ignore);
        assert_eq!(t.labels[1], AnchorLabel::Background);
        assert_eq!(t.labels[2], AnchorLabel::Foreground);
    }

    #[test]
    fn border_filter_keeps_best_anchor_of_each_gt() {
        // Only the cross-boundary anchor overlaps the gt box.
        let gt = vec![BBox::new(0.0, 0.0, 4.0, 8.0)];
        let anchors = vec![
            BBox::new(-8.0, -8.0, 24.0, 24.0),
            BBox::new(40.0, 40.0, 72.0, 72.0),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let t = border_generator().generate(&anchors, &gt, &info(), &mut rng);
        assert_eq!(t.labels[0], AnchorLabel::Foreground);
        assert_eq!(t.matches[0], Some(0));
        assert_eq!(t.box_masks.row(0).to_vec(), vec![1.0; 4]);
        assert_eq!(t.labels[1], AnchorLabel::Background);
    }

    #[test]
    fn default_keeps_cross_boundary_anchors() {
        let gen = RpnTargetGenerator::new(RpnTargetConfig::default()).unwrap();
        let anchors = vec![BBox::new(-20.0, -20.0, 30.0, 30.0), BBox::new(80.0, 80.0, 140.0, 140.0)];
        let mut rng = StdRng::seed_from_u64(0);
        let t = gen.generate(&anchors, &[], &info(), &mut rng);
        assert_eq!(t.num_background(), 2);
    }

    #[test]
    fn no_ground_truth_means_background() {
        let gen = RpnTargetGenerator::new(RpnTargetConfig::default()).unwrap();
        let anchors = vec![BBox::new(0.0, 0.0, 10.0, 10.0); 3];
        let mut rng = StdRng::seed_from_u64(0);
        let t = gen.generate(&anchors, &[], &info(), &mut rng);
        assert!(t.labels.iter().all(|l| *l == AnchorLabel::Background));
        assert_eq!(t.box_targets.sum(), 0.0);
    }

    #[test]
    fn feature_maps_follow_head_layout() {
        let gen = RpnTargetGenerator::new(RpnTargetConfig::default()).unwrap();
        // 1 x 2 grid with 2 base anchors each.
        let anchors = vec![
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(0.0, 0.0, 30.0, 30.0),
            BBox::new(10.0, 0.0, 20.0, 10.0),
            BBox::new(10.0, 0.0, 40.0, 30.0),
        ];
        let gt = vec![BBox::new(10.0, 0.0, 40.0, 30.0)];
        let mut rng = StdRng::seed_from_u64(0);
        let t = gen.generate(&anchors, &gt, &info(), &mut rng);
        let maps = t.to_feature_maps(1, 2).unwrap();
        assert_eq!(maps.cls_target.dim(), (2, 1, 2));
        assert_eq!(maps.box_target.dim(), (8, 1, 2));
        assert_eq!(maps.cls_target[[1, 0, 1]], 1.0);
        assert_eq!(maps.box_mask[[4, 0, 1]], 1.0);
        assert_eq!(maps.box_mask[[0, 0, 1]], 0.0);
        assert!(t.to_feature_maps(3, 1).is_err());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = RpnTargetGenerator::new(RpnTargetConfig {
            pos_iou_thresh: 0.3,
            neg_iou_thresh: 0.7,
            ..RpnTargetConfig::default()
        });
        assert!(err.is_err());
    }
}
