//! Fixed-size foreground/background sampling of proposals.

use crate::data::GroundTruth;
use crate::geometry::BBox;
use crate::kernel;
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::{FrcnnError, FrcnnResult};
use rand::seq::SliceRandom;
use rand::Rng;

/// Sampling parameters for the RCNN training batch.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RcnnSamplerConfig {
    /// ROIs sampled per image.
    pub batch_rois: usize,
    /// Upper bound on the foreground share of the batch.
    pub fg_fraction: f32,
    /// Minimum IoU with a gt box for a foreground ROI.
    pub fg_overlap: f32,
    /// Minimum best IoU for a background ROI; lower ROIs are never sampled.
    pub bg_overlap_lo: f32,
    /// Add the gt boxes themselves to the candidate pool.
    pub include_gt: bool,
    /// Use the parallel kernel for the IoU matrix.
    pub parallel: bool,
}

impl Default for RcnnSamplerConfig {
    fn default() -> Self {
        Self {
            batch_rois: 128,
            fg_fraction: 0.25,
            fg_overlap: 0.5,
            bg_overlap_lo: 0.0,
            include_gt: true,
            parallel: false,
        }
    }
}

impl RcnnSamplerConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.batch_rois == 0 {
            return Err(FrcnnError::config("rcnn_sampler.batch_rois", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.fg_fraction) {
            return Err(FrcnnError::config("rcnn_sampler.fg_fraction", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.fg_overlap) {
            return Err(FrcnnError::config("rcnn_sampler.fg_overlap", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.bg_overlap_lo) || self.bg_overlap_lo > self.fg_overlap {
            return Err(FrcnnError::config(
                "rcnn_sampler.bg_overlap_lo",
                "must be in [0, fg_overlap]",
            ));
        }
        Ok(())
    }

    /// Foreground cap, `floor(batch_rois * fg_fraction)`.
    pub fn max_foreground(&self) -> usize {
        ((self.batch_rois as f32 * self.fg_fraction).floor() as usize).min(self.batch_rois)
    }
}

/// Role of a sampled ROI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Foreground,
    Background,
    /// Filler when no background candidate exists; excluded from the loss.
    Padding,
}

/// One sampled ROI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiSample {
    /// ROI box.
    pub bbox: BBox,
    /// Foreground, background or padding.
    pub kind: SampleKind,
    /// Matched gt index for foreground ROIs.
    pub gt_index: Option<usize>,
    /// Best IoU with any gt box.
    pub overlap: f32,
}

impl RoiSample {
    fn padding() -> Self {
        Self {
            bbox: BBox::default(),
            kind: SampleKind::Padding,
            gt_index: None,
            overlap: 0.0,
        }
    }
}

/// Exactly `batch_rois` samples: foreground, then background, then padding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoiSamples {
    /// Samples in batch order.
    pub samples: Vec<RoiSample>,
}

impl RoiSamples {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn rois(&self) -> Vec<BBox> {
        self.samples.iter().map(|s| s.bbox).collect()
    }

    pub fn num_foreground(&self) -> usize {
        self.count(SampleKind::Foreground)
    }

    pub fn num_background(&self) -> usize {
        self.count(SampleKind::Background)
    }

    fn count(&self, kind: SampleKind) -> usize {
        self.samples.iter().filter(|s| s.kind == kind).count()
    }
}

/// Samples a fixed-size ROI batch for one image.
#[derive(Clone, Debug)]
pub struct RcnnTargetSampler {
    cfg: RcnnSamplerConfig,
}

impl RcnnTargetSampler {
    pub fn new(cfg: RcnnSamplerConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &RcnnSamplerConfig {
        &self.cfg
    }

    /// Samples from `proposals`; degenerate boxes (including proposal
    /// padding) never enter the candidate pool.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        proposals: &[BBox],
        gt: &[GroundTruth],
        rng: &mut R,
    ) -> RoiSamples {
        let _span = trace_span!("rcnn_sample", proposals = proposals.len(), gt = gt.len()).entered();
        let mut candidates: Vec<BBox> = proposals.iter().copied().filter(BBox::is_valid).collect();
        if self.cfg.include_gt {
            candidates.extend(gt.iter().map(|g| g.bbox).filter(BBox::is_valid));
        }

        let gt_boxes: Vec<BBox> = gt.iter().map(|g| g.bbox).collect();
        let ious = kernel::iou_matrix(&candidates, &gt_boxes, self.cfg.parallel);
        let mut fg = Vec::new();
        let mut bg = Vec::new();
        for (i, row) in ious.rows().into_iter().enumerate() {
            let mut best = (0.0f32, None);
            for (j, &v) in row.iter().enumerate() {
                if v > best.0 {
                    best = (v, Some(j));
                }
            }
            let (overlap, gt_index) = best;
            if gt_index.is_some() && overlap >= self.cfg.fg_overlap {
                fg.push(RoiSample {
                    bbox: candidates[i],
                    kind: SampleKind::Foreground,
                    gt_index,
                    overlap,
                });
            } else if overlap >= self.cfg.bg_overlap_lo {
                bg.push(RoiSample {
                    bbox: candidates[i],
                    kind: SampleKind::Background,
                    gt_index: None,
                    overlap,
                });
            }
        }
        trace_event!("rcnn_candidates", foreground = fg.len(), background = bg.len());

        let batch = self.cfg.batch_rois;
        let max_fg = self.cfg.max_foreground();
        if fg.len() > max_fg {
            fg.shuffle(rng);
            fg.truncate(max_fg);
        }
        let num_bg = batch - fg.len();

        let mut samples = fg;
        if bg.len() >= num_bg {
            bg.shuffle(rng);
            bg.truncate(num_bg);
            samples.extend(bg);
        } else if !bg.is_empty() {
            let shortfall = num_bg - bg.len();
            trace_debug!("rcnn_bg_resampled", available = bg.len(), resampled = shortfall);
            let extra: Vec<RoiSample> = (0..shortfall)
                .map(|_| bg[rng.random_range(0..bg.len())])
                .collect();
            samples.extend(bg);
            samples.extend(extra);
        } else {
            trace_debug!("rcnn_padding", padded = num_bg);
        }
        samples.resize(batch, RoiSample::padding());

        RoiSamples { samples }
    }
}
