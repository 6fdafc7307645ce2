//! Intersection-over-union.

use crate::geometry::BBox;
use ndarray::Array2;

/// IoU of two boxes; zero when either box is degenerate.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    if !a.is_valid() || !b.is_valid() {
        return 0.0;
    }
    let iw = a.x2.min(b.x2) - a.x1.max(b.x1);
    if iw <= 0.0 {
        return 0.0;
    }
    let ih = a.y2.min(b.y2) - a.y1.max(b.y1);
    if ih <= 0.0 {
        return 0.0;
    }
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Dense `(rows.len(), cols.len())` IoU matrix.
pub fn iou_matrix(rows: &[BBox], cols: &[BBox]) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((rows.len(), cols.len()));
    for (i, a) in rows.iter().enumerate() {
        for (j, b) in cols.iter().enumerate() {
            out[[i, j]] = iou(a, b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{iou, iou_matrix};
    use crate::geometry::BBox;

    #[test]
    fn identical_boxes_have_unit_iou() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn half_overlap_matches_closed_form() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        // inter 50, union 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_and_degenerate_are_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&a, &BBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert_eq!(iou(&a, &BBox::new(5.0, 5.0, 5.0, 9.0)), 0.0);
        assert_eq!(iou(&a, &BBox::new(f32::NAN, 0.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn matrix_has_expected_layout() {
        let rows = [BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(100.0, 100.0, 110.0, 110.0)];
        let cols = [BBox::new(100.0, 100.0, 110.0, 110.0)];
        let m = iou_matrix(&rows, &cols);
        assert_eq!(m.dim(), (2, 1));
        assert_eq!(m[[0, 0]], 0.0);
        assert!((m[[1, 0]] - 1.0).abs() < 1e-6);
    }
}
