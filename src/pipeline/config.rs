//! Aggregate configuration for the two-stage detector.

use crate::anchor::AnchorConfig;
use crate::rcnn::{DetectorConfig, RcnnSamplerConfig, RcnnTargetConfig};
use crate::rpn::{ProposalConfig, RpnTargetConfig, ScoreActivation};
use crate::util::{FrcnnError, FrcnnResult};
use std::fmt;
use std::str::FromStr;

/// ROI feature extraction used by the external pooling layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoiMode {
    Pool,
    #[default]
    Align,
}

impl RoiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoiMode::Pool => "pool",
            RoiMode::Align => "align",
        }
    }
}

impl FromStr for RoiMode {
    type Err = FrcnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(RoiMode::Pool),
            "align" => Ok(RoiMode::Align),
            _ => Err(FrcnnError::UnknownRoiMode(s.to_string())),
        }
    }
}

impl fmt::Display for RoiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for every stage of the detector.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrcnnConfig {
    /// RPN anchor template.
    pub anchor: AnchorConfig,
    /// How RPN classification maps are turned into probabilities.
    pub rpn_activation: ScoreActivation,
    /// Proposal selection.
    pub proposal: ProposalConfig,
    /// Anchor labelling for RPN training.
    pub rpn_target: RpnTargetConfig,
    /// ROI batch sampling for RCNN training.
    pub rcnn_sampler: RcnnSamplerConfig,
    /// RCNN classification and regression targets.
    pub rcnn_target: RcnnTargetConfig,
    /// Inference post-processing.
    pub detector: DetectorConfig,
    /// ROI feature extraction mode.
    pub roi_mode: RoiMode,
    /// Output size `(height, width)` of ROI pooling.
    pub pooled_size: (usize, usize),
    /// Stride of the feature map the RCNN head pools from.
    pub rcnn_feature_stride: usize,
}

impl Default for FrcnnConfig {
    fn default() -> Self {
        Self {
            anchor: AnchorConfig::default(),
            rpn_activation: ScoreActivation::Sigmoid,
            proposal: ProposalConfig::default(),
            rpn_target: RpnTargetConfig::default(),
            rcnn_sampler: RcnnSamplerConfig::default(),
            rcnn_target: RcnnTargetConfig::default(),
            detector: DetectorConfig::default(),
            roi_mode: RoiMode::Align,
            pooled_size: (14, 14),
            rcnn_feature_stride: 16,
        }
    }
}

impl FrcnnConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        self.anchor.validate()?;
        self.proposal.validate()?;
        self.rpn_target.validate()?;
        self.rcnn_sampler.validate()?;
        self.rcnn_target.validate()?;
        self.detector.validate()?;
        if self.rcnn_target.num_classes != self.detector.num_classes {
            return Err(FrcnnError::config(
                "detector.num_classes",
                "must match rcnn_target.num_classes",
            ));
        }
        if self.pooled_size.0 == 0 || self.pooled_size.1 == 0 {
            return Err(FrcnnError::config("pooled_size", "must be > 0"));
        }
        if self.rcnn_feature_stride == 0 {
            return Err(FrcnnError::config("rcnn_feature_stride", "must be > 0"));
        }
        Ok(())
    }

    /// Sets the class count of both RCNN target generation and detection.
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.rcnn_target.num_classes = num_classes;
        self.detector.num_classes = num_classes;
        self
    }

    /// Scale from image to RCNN feature coordinates.
    pub fn spatial_scale(&self) -> f32 {
        1.0 / self.rcnn_feature_stride as f32
    }
}
