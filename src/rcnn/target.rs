//! Class labels and class-specific regression targets for sampled ROIs.
//!
//! Each foreground ROI regresses only in the four slots of its assigned
//! class. The assignment is kept explicitly per ROI and expanded to the dense
//! `(N, 4 * num_classes)` target and mask arrays on demand.

use crate::coder::BoxCoder;
use crate::data::GroundTruth;
use crate::rcnn::{RoiSamples, SampleKind};
use crate::trace::{trace_event, trace_span};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array1, Array2};

/// RCNN target parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RcnnTargetConfig {
    /// Classes including background.
    pub num_classes: usize,
    /// Regression target normalisation means.
    pub means: [f32; 4],
    /// Regression target normalisation standard deviations.
    pub stds: [f32; 4],
}

impl Default for RcnnTargetConfig {
    fn default() -> Self {
        Self {
            num_classes: 21,
            means: [0.0; 4],
            stds: [0.1, 0.1, 0.2, 0.2],
        }
    }
}

impl RcnnTargetConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.num_classes < 2 {
            return Err(FrcnnError::config(
                "rcnn_target.num_classes",
                "must be >= 2 (background plus one class)",
            ));
        }
        Ok(())
    }
}

/// Regression assignment of one foreground ROI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegressionTarget {
    /// Class whose four slots carry the delta.
    pub class_id: usize,
    /// Encoded offsets from the ROI to its gt box.
    pub delta: [f32; 4],
}

/// Per-ROI targets aligned with [`RoiSamples`].
#[derive(Clone, Debug, PartialEq)]
pub struct RcnnTargets {
    /// Class per ROI; 0 background, -1 ignored padding.
    pub labels: Vec<i32>,
    /// Regression assignment per ROI; `None` outside the foreground.
    pub assignments: Vec<Option<RegressionTarget>>,
    /// Classes including background.
    pub num_classes: usize,
}

impl RcnnTargets {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_array(&self) -> Array1<f32> {
        self.labels.iter().map(|&l| l as f32).collect()
    }

    /// Dense `(N, 4 * num_classes)` targets.
    pub fn box_targets(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.labels.len(), 4 * self.num_classes));
        for (i, assignment) in self.assignments.iter().enumerate() {
            if let Some(t) = assignment {
                for k in 0..4 {
                    out[[i, 4 * t.class_id + k]] = t.delta[k];
                }
            }
        }
        out
    }

    /// Dense `(N, 4 * num_classes)` weights, one in the assigned class slots.
    pub fn box_masks(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.labels.len(), 4 * self.num_classes));
        for (i, assignment) in self.assignments.iter().enumerate() {
            if let Some(t) = assignment {
                for k in 0..4 {
                    out[[i, 4 * t.class_id + k]] = 1.0;
                }
            }
        }
        out
    }
}

/// Builds RCNN targets from sampled ROIs.
#[derive(Clone, Debug)]
pub struct RcnnTargetGenerator {
    cfg: RcnnTargetConfig,
    coder: BoxCoder,
}

impl RcnnTargetGenerator {
    pub fn new(cfg: RcnnTargetConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        let coder = BoxCoder::with_means(cfg.means, cfg.stds)?;
        Ok(Self { cfg, coder })
    }

    pub fn config(&self) -> &RcnnTargetConfig {
        &self.cfg
    }

    /// Checks every gt class is a foreground class of this head.
    pub fn check_classes(&self, gt: &[GroundTruth]) -> FrcnnResult<()> {
        match gt
            .iter()
            .find(|g| g.class_id == 0 || g.class_id >= self.cfg.num_classes)
        {
            Some(g) => Err(FrcnnError::ClassOutOfRange {
                class_id: g.class_id,
                num_classes: self.cfg.num_classes,
            }),
            None => Ok(()),
        }
    }

    pub fn generate(&self, samples: &RoiSamples, gt: &[GroundTruth]) -> FrcnnResult<RcnnTargets> {
        self.check_classes(gt)?;
        let _span = trace_span!("rcnn_target", rois = samples.len()).entered();

        let mut labels = Vec::with_capacity(samples.len());
        let mut assignments = Vec::with_capacity(samples.len());
        for sample in &samples.samples {
            match (sample.kind, sample.gt_index) {
                (SampleKind::Foreground, Some(j)) => {
                    let matched = gt.get(j).ok_or(FrcnnError::InvalidInput(
                        "sample refers to a missing gt box",
                    ))?;
                    labels.push(matched.class_id as i32);
                    assignments.push(Some(RegressionTarget {
                        class_id: matched.class_id,
                        delta: self.coder.encode(&matched.bbox, &sample.bbox),
                    }));
                }
                (SampleKind::Padding, _) => {
                    labels.push(-1);
                    assignments.push(None);
                }
                _ => {
                    labels.push(0);
                    assignments.push(None);
                }
            }
        }
        trace_event!("rcnn_targets", regressed = assignments.iter().flatten().count());
        Ok(RcnnTargets {
            labels,
            assignments,
            num_classes: self.cfg.num_classes,
        })
    }
}
