//! Axis-aligned boxes and image bounds.
//!
//! Boxes use continuous coordinates: a box `(x1, y1, x2, y2)` has width
//! `x2 - x1` and centre `x1 + width / 2`. Corner and centre forms convert into
//! each other exactly up to floating-point rounding.

mod overlap;

pub use overlap::{iou, iou_matrix};

use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Axis-aligned box in corner form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

/// Axis-aligned box in centre form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CenterBox {
    /// Centre x.
    pub cx: f32,
    /// Centre y.
    pub cy: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl BBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from `[x1, y1, x2, y2]`.
    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Filler box used for invalid detection slots.
    pub const fn sentinel() -> Self {
        Self::new(-1.0, -1.0, -1.0, -1.0)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Area with negative extents counted as zero.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Returns true if all coordinates are finite and both extents are positive.
    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.width() > 0.0
            && self.height() > 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x1 + 0.5 * self.width(),
            self.y1 + 0.5 * self.height(),
        )
    }

    pub fn to_center(self) -> CenterBox {
        let w = self.width();
        let h = self.height();
        CenterBox {
            cx: self.x1 + 0.5 * w,
            cy: self.y1 + 0.5 * h,
            w,
            h,
        }
    }

    /// Translates the box by `(dx, dy)`.
    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// Multiplies every coordinate by `factor`.
    pub fn scale(self, factor: f32) -> Self {
        Self::new(
            self.x1 * factor,
            self.y1 * factor,
            self.x2 * factor,
            self.y2 * factor,
        )
    }

    /// Mirrors the box horizontally inside an image of width `image_width`.
    pub fn flip_horizontal(self, image_width: f32) -> Self {
        Self::new(
            image_width - self.x2,
            self.y1,
            image_width - self.x1,
            self.y2,
        )
    }
}

impl CenterBox {
    pub fn to_corner(self) -> BBox {
        let half_w = 0.5 * self.w;
        let half_h = 0.5 * self.h;
        BBox::new(
            self.cx - half_w,
            self.cy - half_h,
            self.cx + half_w,
            self.cy + half_h,
        )
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::from_array(v)
    }
}

/// Reads an `(N, 4)` array of corner boxes.
pub fn boxes_from_array(tensor: &'static str, arr: ArrayView2<'_, f32>) -> FrcnnResult<Vec<BBox>> {
    if arr.ncols() != 4 {
        return Err(FrcnnError::shape(tensor, "(N, 4)", arr.shape()));
    }
    Ok(arr
        .rows()
        .into_iter()
        .map(|row| BBox::new(row[0], row[1], row[2], row[3]))
        .collect())
}

/// Writes boxes into an `(N, 4)` array.
pub fn boxes_to_array(boxes: &[BBox]) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((boxes.len(), 4));
    for (mut row, bbox) in out.rows_mut().into_iter().zip(boxes) {
        row[0] = bbox.x1;
        row[1] = bbox.y1;
        row[2] = bbox.x2;
        row[3] = bbox.y2;
    }
    out
}

/// Resized image bounds and the resize factor applied to the original image.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageInfo {
    /// Resized image height in pixels.
    pub height: f32,
    /// Resized image width in pixels.
    pub width: f32,
    /// Resize factor from original to resized image.
    pub scale: f32,
}

impl ImageInfo {
    pub fn new(height: f32, width: f32, scale: f32) -> FrcnnResult<Self> {
        if !(height.is_finite() && width.is_finite() && scale.is_finite()) {
            return Err(FrcnnError::InvalidInput("image info must be finite"));
        }
        if height <= 0.0 || width <= 0.0 {
            return Err(FrcnnError::InvalidInput("image height and width must be > 0"));
        }
        if scale <= 0.0 {
            return Err(FrcnnError::InvalidInput("image scale must be > 0"));
        }
        Ok(Self {
            height,
            width,
            scale,
        })
    }

    /// Parses `[height, width, scale]`.
    pub fn from_array(arr: ArrayView1<'_, f32>) -> FrcnnResult<Self> {
        if arr.len() != 3 {
            return Err(FrcnnError::shape("im_info", "(3,)", arr.shape()));
        }
        Self::new(arr[0], arr[1], arr[2])
    }
}

#[cfg(test)]
mod tests {
    use super::{boxes_from_array, boxes_to_array, BBox, ImageInfo};
    use crate::util::FrcnnError;
    use ndarray::array;

    #[test]
    fn corner_center_round_trip() {
        let b = BBox::new(3.5, -2.0, 17.25, 40.0);
        let back = b.to_center().to_corner();
        assert!((back.x1 - b.x1).abs() < 1e-5);
        assert!((back.y1 - b.y1).abs() < 1e-5);
        assert!((back.x2 - b.x2).abs() < 1e-5);
        assert!((back.y2 - b.y2).abs() < 1e-5);
    }

    #[test]
    fn validity_requires_positive_extent() {
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BBox::new(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!BBox::new(0.0, 0.0, f32::NAN, 1.0).is_valid());
        assert_eq!(BBox::new(2.0, 0.0, 1.0, 5.0).area(), 0.0);
    }

    #[test]
    fn flip_mirrors_around_image_width() {
        let b = BBox::new(10.0, 5.0, 30.0, 25.0).flip_horizontal(100.0);
        assert_eq!(b, BBox::new(70.0, 5.0, 90.0, 25.0));
    }

    #[test]
    fn array_conversion_checks_columns() {
        let arr = array![[0.0f32, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]];
        let boxes = boxes_from_array("boxes", arr.view()).unwrap();
        assert_eq!(boxes[1], BBox::new(4.0, 5.0, 6.0, 7.0));
        assert_eq!(boxes_to_array(&boxes), arr);

        let bad = array![[0.0f32, 1.0, 2.0]];
        let err = boxes_from_array("boxes", bad.view()).unwrap_err();
        assert!(matches!(err, FrcnnError::ShapeMismatch { tensor: "boxes", .. }));
    }

    #[test]
    fn image_info_parses_triplet() {
        let info = ImageInfo::from_array(array![600.0f32, 800.0, 1.6].view()).unwrap();
        assert_eq!(info.height, 600.0);
        assert_eq!(info.width, 800.0);
        assert!(ImageInfo::from_array(array![600.0f32, 800.0].view()).is_err());
        assert!(ImageInfo::new(0.0, 10.0, 1.0).is_err());
    }
}
