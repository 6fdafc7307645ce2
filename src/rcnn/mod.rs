//! Second-stage (RCNN) training targets and inference post-processing.

mod detector;
mod sampler;
mod target;

pub use detector::{Detection, Detections, DetectorConfig, RcnnDetector};
pub use sampler::{RcnnSamplerConfig, RcnnTargetSampler, RoiSample, RoiSamples, SampleKind};
pub use target::{RcnnTargetConfig, RcnnTargetGenerator, RcnnTargets, RegressionTarget};
