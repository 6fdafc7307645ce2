//! Batch assembly helpers.

use crate::geometry::BBox;
use crate::util::{FrcnnError, FrcnnResult};
use ndarray::{Array2, ArrayD, Axis, IxDyn, Slice};

/// Largest per-image tensor rank accepted by [`pad_to_max`].
pub const MAX_PAD_RANK: usize = 3;

/// Stacks per-image tensors into one zero-padded batch tensor.
///
/// The output shape is `[batch, max_0, .., max_{r-1}]`; each item is copied
/// into the leading corner of its slot. A single item only gains the batch
/// axis.
pub fn pad_to_max(tensors: &[ArrayD<f32>]) -> FrcnnResult<ArrayD<f32>> {
    let first = tensors
        .first()
        .ok_or(FrcnnError::InvalidInput("cannot pad an empty batch"))?;
    let rank = first.ndim();
    if rank > MAX_PAD_RANK {
        return Err(FrcnnError::UnsupportedRank {
            tensor: "batch item",
            rank,
            max: MAX_PAD_RANK,
        });
    }
    if let Some(bad) = tensors.iter().find(|t| t.ndim() != rank) {
        return Err(FrcnnError::shape(
            "batch item",
            format!("rank {rank}"),
            bad.shape(),
        ));
    }
    if tensors.len() == 1 {
        return Ok(first.clone().insert_axis(Axis(0)));
    }

    let mut dims = Vec::with_capacity(rank + 1);
    dims.push(tensors.len());
    for axis in 0..rank {
        dims.push(tensors.iter().map(|t| t.shape()[axis]).max().unwrap_or(0));
    }
    let mut out = ArrayD::<f32>::zeros(IxDyn(&dims));
    for (j, tensor) in tensors.iter().enumerate() {
        let mut slot = out.index_axis_mut(Axis(0), j);
        let mut region = slot.slice_each_axis_mut(|ax| Slice::from(0..tensor.shape()[ax.axis.index()]));
        region.assign(tensor);
    }
    Ok(out)
}

/// Flattens per-image ROIs into a `(sum N_b, 5)` array of
/// `(batch_index, x1, y1, x2, y2)` rows, the layout ROI pooling consumes.
pub fn roi_batch_array(rois_per_image: &[Vec<BBox>]) -> Array2<f32> {
    let total: usize = rois_per_image.iter().map(Vec::len).sum();
    let mut out = Array2::<f32>::zeros((total, 5));
    let mut rows = out.rows_mut().into_iter();
    for (batch_idx, rois) in rois_per_image.iter().enumerate() {
        for (roi, mut row) in rois.iter().zip(rows.by_ref()) {
            row[0] = batch_idx as f32;
            row[1] = roi.x1;
            row[2] = roi.y1;
            row[3] = roi.x2;
            row[4] = roi.y2;
        }
    }
    out
}
