//! Clipping boxes to image bounds.

use crate::geometry::BBox;

/// Clamps a box into `[0, width - 1] x [0, height - 1]`.
///
/// Coordinates that would invert after clamping collapse onto the first
/// corner, yielding a zero-area box at the boundary. NaN maps to zero.
pub fn clip_box(bbox: &BBox, image_height: f32, image_width: f32) -> BBox {
    let max_x = (image_width - 1.0).max(0.0);
    let max_y = (image_height - 1.0).max(0.0);
    let x1 = clamp_coord(bbox.x1, max_x);
    let y1 = clamp_coord(bbox.y1, max_y);
    let x2 = clamp_coord(bbox.x2, max_x).max(x1);
    let y2 = clamp_coord(bbox.y2, max_y).max(y1);
    BBox::new(x1, y1, x2, y2)
}

fn clamp_coord(v: f32, max: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, max)
    }
}
