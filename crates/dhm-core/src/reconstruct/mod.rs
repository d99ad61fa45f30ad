//! Frame reconstruction: off-axis demodulation and in-line volume sweeps.

pub mod inline;
pub mod off_axis;

use std::ops::Range;

use ndarray::{s, Array2};
use num_complex::Complex;

use crate::error::Result;
use crate::state::ReconstructionState;

/// Rows/columns of the processing region: the ROI when enabled (validated
/// against the loaded hologram), the full frame otherwise. Both
/// reconstructors and the crop bookkeeping go through this one transform so
/// their coordinate handling cannot diverge.
pub(crate) fn working_region(
    state: &ReconstructionState,
) -> Result<(Range<usize>, Range<usize>)> {
    let (h, w) = state.buffers.hologram.dim();
    match state.roi() {
        Some(roi) => {
            roi.validate(h, w)?;
            Ok((roi.top..roi.bottom, roi.left..roi.right))
        }
        None => Ok((0..h, 0..w)),
    }
}

pub(crate) fn crop_region(
    data: &Array2<f32>,
    rows: &Range<usize>,
    cols: &Range<usize>,
) -> Array2<f32> {
    data.slice(s![rows.clone(), cols.clone()]).to_owned()
}

/// Crop a padded (and possibly propagated) field back to the pre-pad
/// extent. The offset to subtract is the apodization pad width, not the
/// ROI origin: the field is already in region coordinates.
pub(crate) fn crop_after_pad(
    field: &Array2<Complex<f64>>,
    pad: usize,
    shape: (usize, usize),
) -> Array2<Complex<f64>> {
    field
        .slice(s![pad..pad + shape.0, pad..pad + shape.1])
        .to_owned()
}
