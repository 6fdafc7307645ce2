//! Conversion of RPN head maps into per-anchor order.
//!
//! The head emits scores as `(A, H, W)` and deltas as `(4A, H, W)` where
//! channel `4a + k` holds delta `k` of base anchor `a`. Anchors are ordered by
//! cell (row-major) then base anchor, so anchor `(h * W + w) * A + a` reads
//! `scores[a, h, w]` and `deltas[4a..4a + 4, h, w]`.

use crate::util::math::sigmoid;
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array1, Array2, ArrayView3};

/// How raw classification values map to foreground probabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScoreActivation {
    /// Values are already probabilities.
    #[default]
    Probability,
    /// Values are logits; apply the logistic sigmoid.
    Sigmoid,
}

/// RPN outputs in anchor order.
#[derive(Clone, Debug, PartialEq)]
pub struct RpnHeadOutput {
    /// Foreground probability per anchor, `(N,)`.
    pub scores: Array1<f32>,
    /// Regression deltas per anchor, `(N, 4)`.
    pub deltas: Array2<f32>,
}

impl RpnHeadOutput {
    /// Reorders `(A, H, W)` scores and `(4A, H, W)` deltas into anchor order.
    pub fn from_feature_maps(
        cls: ArrayView3<'_, f32>,
        reg: ArrayView3<'_, f32>,
        activation: ScoreActivation,
    ) -> FrcnnResult<Self> {
        let (num_base, height, width) = cls.dim();
        if reg.dim() != (4 * num_base, height, width) {
            return Err(FrcnnError::shape(
                "rpn_bbox_pred",
                format!("({}, {height}, {width})", 4 * num_base),
                reg.shape(),
            ));
        }

        let n = num_base * height * width;
        let mut scores = Array1::<f32>::zeros(n);
        let mut deltas = Array2::<f32>::zeros((n, 4));
        for h in 0..height {
            for w in 0..width {
                let cell = (h * width + w) * num_base;
                for a in 0..num_base {
                    let idx = cell + a;
                    let raw = cls[[a, h, w]];
                    scores[idx] = match activation {
                        ScoreActivation::Probability => raw,
                        ScoreActivation::Sigmoid => sigmoid(raw),
                    };
                    for k in 0..4 {
                        deltas[[idx, k]] = reg[[4 * a + k, h, w]];
                    }
                }
            }
        }
        Ok(Self { scores, deltas })
    }

    pub fn num_anchors(&self) -> usize {
        self.scores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{RpnHeadOutput, ScoreActivation};
    use crate::util::FrcnnError;
    use ndarray::Array3;

    #[test]
    fn reorders_into_cell_then_anchor() {
        // A = 2, H = 1, W = 2
        let cls = Array3::from_shape_fn((2, 1, 2), |(a, _, w)| (10 * a + w) as f32);
        let reg = Array3::from_shape_fn((8, 1, 2), |(c, _, w)| (100 * w + c) as f32);
        let out = RpnHeadOutput::from_feature_maps(cls.view(), reg.view(), ScoreActivation::Probability)
            .unwrap();
        assert_eq!(out.num_anchors(), 4);
        assert_eq!(out.scores.to_vec(), vec![0.0, 10.0, 1.0, 11.0]);
        // anchor 3 = cell (0, 1), base anchor 1 -> channels 4..8 at w = 1
        assert_eq!(out.deltas.row(3).to_vec(), vec![104.0, 105.0, 106.0, 107.0]);
    }

    #[test]
    fn sigmoid_activation_maps_logits() {
        let cls = Array3::<f32>::zeros((1, 1, 1));
        let reg = Array3::<f32>::zeros((4, 1, 1));
        let out =
            RpnHeadOutput::from_feature_maps(cls.view(), reg.view(), ScoreActivation::Sigmoid).unwrap();
        assert!((out.scores[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_delta_map() {
        let cls = Array3::<f32>::zeros((3, 2, 2));
        let reg = Array3::<f32>::zeros((3, 2, 2));
        let err = RpnHeadOutput::from_feature_maps(cls.view(), reg.view(), ScoreActivation::Probability)
            .unwrap_err();
        assert_eq!(
            err,
            FrcnnError::ShapeMismatch {
                tensor: "rpn_bbox_pred",
                expected: "(12, 2, 2)".to_string(),
                got: "[3, 2, 2]".to_string(),
            }
        );
    }
}
