//! Per-class decoding and suppression of RCNN outputs.
//!
//! For every foreground class the ROIs are decoded with that class's deltas,
//! clipped, thresholded on score and suppressed independently. The result has
//! a fixed `(num_classes - 1) * num_rois` layout; slots past a class's
//! survivors are sentinels with class and score `-1`.

use crate::candidate::topk::{top_k, ScoredBox};
use crate::coder::{clip_box, BoxCoder};
use crate::geometry::{BBox, ImageInfo};
use crate::kernel;
use crate::trace::{trace_event, trace_span};
use crate::util::math::softmax_rows;
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array1, Array2, ArrayView2};

/// Inference post-processing parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Classes including background.
    pub num_classes: usize,
    /// Delta de-normalisation means.
    pub means: [f32; 4],
    /// Delta de-normalisation standard deviations.
    pub stds: [f32; 4],
    /// Per-class NMS IoU threshold.
    pub nms_thresh: f32,
    /// Candidates per class kept before NMS; `None` keeps all.
    pub nms_topk: Option<usize>,
    /// Scores below this are discarded before NMS.
    pub min_score: f32,
    /// Use the parallel kernel for NMS.
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            num_classes: 21,
            means: [0.0; 4],
            stds: [0.1, 0.1, 0.2, 0.2],
            nms_thresh: 0.3,
            nms_topk: None,
            min_score: 1e-4,
            parallel: false,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.num_classes < 2 {
            return Err(FrcnnError::config(
                "detector.num_classes",
                "must be >= 2 (background plus one class)",
            ));
        }
        if !(0.0..=1.0).contains(&self.nms_thresh) {
            return Err(FrcnnError::config("detector.nms_thresh", "must be in [0, 1]"));
        }
        if self.nms_topk == Some(0) {
            return Err(FrcnnError::config("detector.nms_topk", "must be > 0 when set"));
        }
        if !self.min_score.is_finite() {
            return Err(FrcnnError::config("detector.min_score", "must be finite"));
        }
        Ok(())
    }
}

/// One detection slot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Detection {
    /// Internal class id (`>= 1`), or `-1` for an empty slot.
    pub class_id: i32,
    /// Class probability, or `-1` for an empty slot.
    pub score: f32,
    /// Clipped detection box in resized-image coordinates.
    pub bbox: BBox,
}

impl Detection {
    pub const fn sentinel() -> Self {
        Self {
            class_id: -1,
            score: -1.0,
            bbox: BBox::sentinel(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.class_id >= 1
    }

    /// Zero-based class id as used by annotations and metric collectors.
    pub fn annotation_class(&self) -> Option<usize> {
        if self.is_valid() {
            Some(self.class_id as usize - 1)
        } else {
            None
        }
    }
}

/// Fixed-layout detections of one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Detections {
    /// `(num_classes - 1) * slots_per_class` entries grouped by class.
    pub entries: Vec<Detection>,
    /// Slots reserved per class, equal to the ROI count.
    pub slots_per_class: usize,
}

impl Detections {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn valid(&self) -> impl Iterator<Item = &Detection> {
        self.entries.iter().filter(|d| d.is_valid())
    }

    /// Valid detections only, in slot order.
    pub fn compact(&self) -> Vec<Detection> {
        self.valid().copied().collect()
    }

    /// Maps valid boxes back to original-image coordinates.
    pub fn rescaled(&self, im_scale: f32) -> Self {
        let factor = 1.0 / im_scale;
        let entries = self
            .entries
            .iter()
            .map(|d| {
                if d.is_valid() {
                    Detection {
                        bbox: d.bbox.scale(factor),
                        ..*d
                    }
                } else {
                    *d
                }
            })
            .collect();
        Self {
            entries,
            slots_per_class: self.slots_per_class,
        }
    }

    /// Flat `(M, 6)` array of `[class_id, score, x1, y1, x2, y2]` rows.
    pub fn to_array(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.entries.len(), 6));
        for (mut row, d) in out.rows_mut().into_iter().zip(&self.entries) {
            row[0] = d.class_id as f32;
            row[1] = d.score;
            row[2] = d.bbox.x1;
            row[3] = d.bbox.y1;
            row[4] = d.bbox.x2;
            row[5] = d.bbox.y2;
        }
        out
    }

    pub fn scores(&self) -> Array1<f32> {
        self.entries.iter().map(|d| d.score).collect()
    }
}

/// Per-class NMS detector.
#[derive(Clone, Debug)]
pub struct RcnnDetector {
    cfg: DetectorConfig,
    coder: BoxCoder,
}

impl RcnnDetector {
    pub fn new(cfg: DetectorConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        let coder = BoxCoder::with_means(cfg.means, cfg.stds)?;
        Ok(Self { cfg, coder })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Detects from class probabilities `(N, C)` and deltas `(N, 4C)`.
    pub fn detect(
        &self,
        rois: &[BBox],
        cls_prob: ArrayView2<'_, f32>,
        bbox_pred: ArrayView2<'_, f32>,
        im_info: &ImageInfo,
    ) -> FrcnnResult<Detections> {
        let n = rois.len();
        let c = self.cfg.num_classes;
        if cls_prob.dim() != (n, c) {
            return Err(FrcnnError::shape("cls_prob", format!("({n}, {c})"), cls_prob.shape()));
        }
        if bbox_pred.dim() != (n, 4 * c) {
            return Err(FrcnnError::shape(
                "bbox_pred",
                format!("({n}, {})", 4 * c),
                bbox_pred.shape(),
            ));
        }
        let _span = trace_span!("rcnn_detect", rois = n, classes = c).entered();

        let mut entries = Vec::with_capacity((c - 1) * n);
        for class_id in 1..c {
            let mut candidates = Vec::new();
            for (i, roi) in rois.iter().enumerate() {
                let score = cls_prob[[i, class_id]];
                if !roi.is_valid() || !score.is_finite() || score < self.cfg.min_score {
                    continue;
                }
                let delta: [f32; 4] = std::array::from_fn(|k| bbox_pred[[i, 4 * class_id + k]]);
                let decoded = self.coder.decode(delta, roi);
                let bbox = clip_box(&decoded, im_info.height, im_info.width);
                candidates.push(ScoredBox::new(bbox, score, i));
            }
            let ranked = top_k(candidates, self.cfg.nms_topk.unwrap_or(usize::MAX));
            let keep = kernel::nms(&ranked, self.cfg.nms_thresh, usize::MAX, self.cfg.parallel);
            let kept = keep.len();
            entries.extend(keep.into_iter().map(|k| Detection {
                class_id: class_id as i32,
                score: ranked[k].score,
                bbox: ranked[k].bbox,
            }));
            entries.extend(std::iter::repeat(Detection::sentinel()).take(n - kept));
        }

        let detections = Detections {
            entries,
            slots_per_class: n,
        };
        trace_event!("detections", kept = detections.valid().count());
        Ok(detections)
    }

    /// Like [`RcnnDetector::detect`] but from raw class logits.
    pub fn detect_logits(
        &self,
        rois: &[BBox],
        cls_logits: ArrayView2<'_, f32>,
        bbox_pred: ArrayView2<'_, f32>,
        im_info: &ImageInfo,
    ) -> FrcnnResult<Detections> {
        let prob = softmax_rows(cls_logits);
        self.detect(rois, prob.view(), bbox_pred, im_info)
    }
}
