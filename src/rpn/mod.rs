//! Region proposal network post-processing and training targets.

mod head;
mod proposal;
mod target;

pub use head::{RpnHeadOutput, ScoreActivation};
pub use proposal::{proposal_boxes, Proposal, ProposalConfig, ProposalGenerator};
pub use target::{AnchorLabel, RpnTargetConfig, RpnTargetGenerator, RpnTargetMaps, RpnTargets};
