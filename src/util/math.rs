//! Numeric helpers shared by the coders and score post-processing.

use ndarray::{Array2, ArrayView2, Axis};

/// Logistic sigmoid.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Row-wise softmax over a `(rows, classes)` matrix.
///
/// Each row is shifted by its maximum before exponentiation.
pub fn softmax_rows(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let shift = if max.is_finite() { max } else { 0.0 };
        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - shift).exp();
            sum += *value;
        }
        if sum > 0.0 && sum.is_finite() {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// Replaces non-finite values with `fallback`.
#[inline]
pub(crate) fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
