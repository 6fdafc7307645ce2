//! Regression-target encoding and decoding.
//!
//! Targets are normalized centre offsets and log-scale ratios:
//! `dx = ((gx - rx) / rw - mean_x) / std_x`, `dw = (ln(gw / rw) - mean_w) / std_w`,
//! with `dy`, `dh` analogous.

mod clip;

pub use clip::clip_box;

use crate::geometry::BBox;
use crate::util::math::finite_or;
use crate::util::{FrcnnError, FrcnnResult};

/// Extent substituted for non-positive widths and heights while encoding.
pub const MIN_EXTENT: f32 = 1.0;

/// Default bound on decoded log-scale deltas, `ln(1000 / 16)`.
pub fn default_scale_clip() -> f32 {
    (1000.0f32 / 16.0).ln()
}

/// Normalized centre-offset box coder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxCoder {
    means: [f32; 4],
    stds: [f32; 4],
    scale_clip: f32,
}

impl Default for BoxCoder {
    fn default() -> Self {
        Self {
            means: [0.0; 4],
            stds: [1.0; 4],
            scale_clip: default_scale_clip(),
        }
    }
}

impl BoxCoder {
    /// Creates a coder with zero means and the given standard deviations.
    pub fn new(stds: [f32; 4]) -> FrcnnResult<Self> {
        Self::with_means([0.0; 4], stds)
    }

    pub fn with_means(means: [f32; 4], stds: [f32; 4]) -> FrcnnResult<Self> {
        if stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FrcnnError::config("stds", "must be finite and > 0"));
        }
        if means.iter().any(|m| !m.is_finite()) {
            return Err(FrcnnError::config("means", "must be finite"));
        }
        Ok(Self {
            means,
            stds,
            scale_clip: default_scale_clip(),
        })
    }

    /// Overrides the bound applied to `dw`/`dh` before exponentiation.
    pub fn with_scale_clip(mut self, scale_clip: f32) -> Self {
        self.scale_clip = scale_clip.abs();
        self
    }

    pub fn stds(&self) -> [f32; 4] {
        self.stds
    }

    pub fn means(&self) -> [f32; 4] {
        self.means
    }

    /// Encodes `target` relative to `reference` as `[dx, dy, dw, dh]`.
    pub fn encode(&self, target: &BBox, reference: &BBox) -> [f32; 4] {
        let r = reference.to_center();
        let g = target.to_center();
        let rw = guarded_extent(r.w);
        let rh = guarded_extent(r.h);
        let gw = guarded_extent(g.w);
        let gh = guarded_extent(g.h);

        let raw = [
            (g.cx - r.cx) / rw,
            (g.cy - r.cy) / rh,
            (gw / rw).ln(),
            (gh / rh).ln(),
        ];
        std::array::from_fn(|k| finite_or((raw[k] - self.means[k]) / self.stds[k], 0.0))
    }

    /// Decodes `[dx, dy, dw, dh]` against `reference` into a corner box.
    pub fn decode(&self, delta: [f32; 4], reference: &BBox) -> BBox {
        let r = reference.to_center();
        let d: [f32; 4] = std::array::from_fn(|k| {
            finite_or(delta[k], 0.0) * self.stds[k] + self.means[k]
        });
        let dw = d[2].clamp(-self.scale_clip, self.scale_clip);
        let dh = d[3].clamp(-self.scale_clip, self.scale_clip);

        let cx = d[0] * r.w + r.cx;
        let cy = d[1] * r.h + r.cy;
        let w = dw.exp() * r.w;
        let h = dh.exp() * r.h;
        BBox::new(cx - 0.5 * w, cy - 0.5 * h, cx + 0.5 * w, cy + 0.5 * h)
    }
}

fn guarded_extent(v: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        MIN_EXTENT
    }
}
