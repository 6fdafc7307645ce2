//! Ground-truth boxes.
//!
//! Raw annotations carry `(x1, y1, x2, y2, class, difficult)` rows with
//! zero-based classes. Internally class 0 is background, so parsed classes
//! are shifted by one.

use crate::geometry::{BBox, ImageInfo};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::ArrayView2;

/// Annotated object in resized-image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundTruth {
    /// Object box.
    pub bbox: BBox,
    /// Internal class id, `>= 1`.
    pub class_id: usize,
    /// Marked difficult in the annotation.
    pub difficult: bool,
}

impl GroundTruth {
    pub fn new(bbox: BBox, class_id: usize) -> Self {
        Self {
            bbox,
            class_id,
            difficult: false,
        }
    }

    pub fn with_difficult(mut self, difficult: bool) -> Self {
        self.difficult = difficult;
        self
    }

    /// Parses an `(N, 5)` or `(N, 6)` annotation array.
    ///
    /// Rows with a negative class are batch padding and are skipped.
    pub fn from_annotations(label: ArrayView2<'_, f32>) -> FrcnnResult<Vec<Self>> {
        let cols = label.ncols();
        if cols != 5 && cols != 6 {
            return Err(FrcnnError::shape("gt_label", "(N, 5) or (N, 6)", label.shape()));
        }
        let mut out = Vec::with_capacity(label.nrows());
        for row in label.rows() {
            let class = row[4];
            if !class.is_finite() {
                return Err(FrcnnError::InvalidInput("annotation class must be finite"));
            }
            if class < 0.0 {
                continue;
            }
            let bbox = BBox::new(row[0], row[1], row[2], row[3]);
            if !bbox.to_array().iter().all(|v| v.is_finite()) {
                return Err(FrcnnError::InvalidInput("annotation box must be finite"));
            }
            let difficult = cols == 6 && row[5] > 0.5;
            out.push(Self::new(bbox, class.round() as usize + 1).with_difficult(difficult));
        }
        Ok(out)
    }

    /// Parses annotations and maps them into the resized (and optionally
    /// horizontally flipped) training image.
    pub fn for_training(
        label: ArrayView2<'_, f32>,
        im_info: &ImageInfo,
        flip: bool,
    ) -> FrcnnResult<Vec<Self>> {
        let mut gt = Self::from_annotations(label)?;
        for item in gt.iter_mut() {
            *item = item.scaled(im_info.scale);
            if flip {
                *item = item.flipped(im_info.width);
            }
        }
        Ok(gt)
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            bbox: self.bbox.scale(factor),
            ..self
        }
    }

    pub fn flipped(self, image_width: f32) -> Self {
        Self {
            bbox: self.bbox.flip_horizontal(image_width),
            ..self
        }
    }

    /// Zero-based class id as used by raw annotations.
    pub fn annotation_class(&self) -> usize {
        self.class_id.saturating_sub(1)
    }
}

/// Collects the boxes of a ground-truth slice.
pub fn gt_boxes(gt: &[GroundTruth]) -> Vec<BBox> {
    gt.iter().map(|g| g.bbox).collect()
}
