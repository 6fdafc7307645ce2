//! Error types for frcnn.

use thiserror::Error;

/// Result alias for frcnn operations.
pub type FrcnnResult<T> = std::result::Result<T, FrcnnError>;

/// Errors surfaced by configuration checks and shape validation.
///
/// Degenerate geometry is never reported here; boxes are clamped instead.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrcnnError {
    /// A configuration value is out of its supported range.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// The ROI pooling mode name is not recognized.
    #[error("unknown roi mode `{0}` (expected `pool` or `align`)")]
    UnknownRoiMode(String),
    /// A tensor does not have the expected shape.
    #[error("shape mismatch for `{tensor}`: expected {expected}, got {got}")]
    ShapeMismatch {
        tensor: &'static str,
        expected: String,
        got: String,
    },
    /// A tensor rank is not supported by the operation.
    #[error("unsupported rank {rank} for `{tensor}` (max {max})")]
    UnsupportedRank {
        tensor: &'static str,
        rank: usize,
        max: usize,
    },
    /// A ground-truth class id does not fit the configured class count.
    #[error("class id {class_id} out of range for {num_classes} classes")]
    ClassOutOfRange { class_id: usize, num_classes: usize },
    /// The input data is invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl FrcnnError {
    pub(crate) fn shape(tensor: &'static str, expected: impl Into<String>, got: &[usize]) -> Self {
        FrcnnError::ShapeMismatch {
            tensor,
            expected: expected.into(),
            got: format!("{got:?}"),
        }
    }

    pub(crate) fn config(field: &'static str, reason: &'static str) -> Self {
        FrcnnError::InvalidConfig { field, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::FrcnnError;

    #[test]
    fn shape_error_names_tensor_and_shapes() {
        let err = FrcnnError::shape("rpn_bbox_pred", "(36, 4, 5)", &[9, 4, 5]);
        assert_eq!(
            err.to_string(),
            "shape mismatch for `rpn_bbox_pred`: expected (36, 4, 5), got [9, 4, 5]"
        );
    }
}
