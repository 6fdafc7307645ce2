//! Anchor generation over a feature grid.
//!
//! A fixed template of base anchors is built once from the stride, scales and
//! aspect ratios, then translated to every feature cell. Anchors are ordered
//! row-major over cells and, within a cell, ratio-major then scale.
//!
//! The aspect ratio is `h / w`. For each ratio the stride-sized base extent is
//! `bw = round(sqrt(stride^2 / ratio))`, `bh = round(bw * ratio)` (ties to even),
//! and each scale multiplies both. With stride 16, scales `(8, 16, 32)` and
//! ratios `(0.5, 1, 2)` this reproduces the classic Faster R-CNN base set, e.g.
//! `[-84, -40, 100, 56]` for ratio 0.5 / scale 8, every anchor centred on
//! `(8, 8)`.

mod cache;

pub use cache::AnchorCache;

use crate::geometry::{boxes_to_array, BBox};
use crate::trace::{trace_event, trace_span};
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::Array2;

/// Anchor template parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnchorConfig {
    /// Image pixels per feature cell.
    pub stride: usize,
    /// Anchor scales in units of `stride`.
    pub scales: Vec<f32>,
    /// Aspect ratios `h / w`.
    pub ratios: Vec<f32>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            stride: 16,
            scales: vec![8.0, 16.0, 32.0],
            ratios: vec![0.5, 1.0, 2.0],
        }
    }
}

impl AnchorConfig {
    pub fn validate(&self) -> FrcnnResult<()> {
        if self.stride == 0 {
            return Err(FrcnnError::config("anchor.stride", "must be > 0"));
        }
        if self.scales.is_empty() {
            return Err(FrcnnError::config("anchor.scales", "must not be empty"));
        }
        if self.ratios.is_empty() {
            return Err(FrcnnError::config("anchor.ratios", "must not be empty"));
        }
        if self.scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FrcnnError::config("anchor.scales", "must be finite and > 0"));
        }
        if self.ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(FrcnnError::config("anchor.ratios", "must be finite and > 0"));
        }
        Ok(())
    }

    /// Number of anchors per feature cell.
    pub fn num_base(&self) -> usize {
        self.scales.len() * self.ratios.len()
    }
}

/// Tiles a base-anchor template over feature grids.
#[derive(Clone, Debug)]
pub struct AnchorGenerator {
    stride: usize,
    base: Vec<BBox>,
}

impl AnchorGenerator {
    pub fn new(cfg: &AnchorConfig) -> FrcnnResult<Self> {
        cfg.validate()?;
        Ok(Self {
            stride: cfg.stride,
            base: base_anchors(cfg.stride, &cfg.scales, &cfg.ratios),
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Anchors of the cell at the origin, centred on `(stride / 2, stride / 2)`.
    pub fn base_anchors(&self) -> &[BBox] {
        &self.base
    }

    pub fn num_base(&self) -> usize {
        self.base.len()
    }

    /// Total anchors for a `height x width` grid.
    pub fn count(&self, height: usize, width: usize) -> usize {
        height * width * self.base.len()
    }

    /// Generates anchors for a `height x width` feature grid.
    pub fn generate(&self, height: usize, width: usize) -> Vec<BBox> {
        let _span = trace_span!("anchors", height = height, width = width).entered();
        let stride = self.stride as f32;
        let mut out = Vec::with_capacity(self.count(height, width));
        for row in 0..height {
            let shift_y = row as f32 * stride;
            for col in 0..width {
                let shift_x = col as f32 * stride;
                out.extend(self.base.iter().map(|b| b.translate(shift_x, shift_y)));
            }
        }
        trace_event!("anchors_generated", count = out.len());
        out
    }

    /// Generates anchors as an `(H * W * A, 4)` array.
    pub fn generate_array(&self, height: usize, width: usize) -> Array2<f32> {
        boxes_to_array(&self.generate(height, width))
    }
}

fn base_anchors(stride: usize, scales: &[f32], ratios: &[f32]) -> Vec<BBox> {
    let stride = stride as f32;
    let area = stride * stride;
    let center = 0.5 * stride;
    let mut out = Vec::with_capacity(scales.len() * ratios.len());
    for &ratio in ratios {
        let base_w = (area / ratio).sqrt().round_ties_even().max(1.0);
        let base_h = (base_w * ratio).round_ties_even().max(1.0);
        for &scale in scales {
            let half_w = 0.5 * base_w * scale;
            let half_h = 0.5 * base_h * scale;
            out.push(BBox::new(
                center - half_w,
                center - half_h,
                center + half_w,
                center + half_h,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{AnchorConfig, AnchorGenerator};
    use crate::geometry::BBox;

    #[test]
    fn base_anchors_are_centered_on_first_cell() {
        let gen = AnchorGenerator::new(&AnchorConfig::default()).unwrap();
        assert_eq!(gen.num_base(), 9);
        for anchor in gen.base_anchors() {
            let (cx, cy) = anchor.center();
            assert_eq!((cx, cy), (8.0, 8.0));
        }
    }

    #[test]
    fn grid_is_row_major() {
        let gen = AnchorGenerator::new(&AnchorConfig {
            stride: 4,
            scales: vec![1.0],
            ratios: vec![1.0],
        })
        .unwrap();
        let anchors = gen.generate(2, 3);
        assert_eq!(anchors.len(), 6);
        assert_eq!(anchors[0], BBox::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(anchors[1], BBox::new(4.0, 0.0, 8.0, 4.0));
        assert_eq!(anchors[3], BBox::new(0.0, 4.0, 4.0, 8.0));
    }

    #[test]
    fn empty_grid_yields_no_anchors() {
        let gen = AnchorGenerator::new(&AnchorConfig::default()).unwrap();
        assert!(gen.generate(0, 5).is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let err = AnchorGenerator::new(&AnchorConfig {
            ratios: vec![],
            ..AnchorConfig::default()
        });
        assert!(err.is_err());
        let err = AnchorGenerator::new(&AnchorConfig {
            stride: 0,
            ..AnchorConfig::default()
        });
        assert!(err.is_err());
    }
}
