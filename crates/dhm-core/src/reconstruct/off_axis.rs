//! Off-axis reconstruction: Filter -> Propagate -> Unwrap -> Crop -> Maps.

use ndarray::Array2;
use num_complex::Complex;
use tracing::debug;

use crate::apodize::apodize;
use crate::consts::APODIZATION_SHAPE_FACTOR;
use crate::error::{DhmError, Result};
use crate::filter;
use crate::propagate::AngularSpectrum;
use crate::state::ReconstructionState;
use crate::unwrap::unwrap_phase;

use super::{crop_after_pad, crop_region, working_region};

/// Build (or reuse) the static background phase reference.
///
/// The background hologram is filtered with the spectral mask located on
/// it, demodulated, and reduced to the complex conjugate of its unit
/// phasor. Multiplying each frame by this reference cancels the carrier
/// ramp and the static aberration shared by frame and background. The
/// result is cached until the background, filter parameters, system
/// parameters or ROI change.
pub fn ensure_background_reference(state: &mut ReconstructionState) -> Result<()> {
    if !state.background_loaded() {
        return Err(DhmError::Parameter(
            "off-axis reconstruction requires a loaded background hologram".into(),
        ));
    }
    // Checked before the cache fast path: a mid-series frame of different
    // dimensions must fail here, not downstream against the cached mask.
    if state.buffers.background.dim() != state.buffers.hologram.dim() {
        return Err(DhmError::Parameter(format!(
            "background dimensions {:?} do not match hologram {:?}",
            state.buffers.background.dim(),
            state.buffers.hologram.dim()
        )));
    }
    if state.background_reference_valid() {
        return Ok(());
    }

    let (rows, cols) = working_region(state)?;
    let background = crop_region(&state.buffers.background, &rows, &cols);

    let params = *state.filter();
    let mask = filter::locate_and_mask(&background, params.quadrant, params.rate, params.kind)?;
    debug!(radius = mask.radius, "Background spectral mask rebuilt");

    let demodulated = filter::demodulate(&background, &mask.mask);
    let reference = demodulated.mapv(|c| Complex::from_polar(1.0, -c.arg()));

    state.buffers.fourier_mask = mask.mask;
    state.set_background_reference(reference);
    Ok(())
}

/// Stage 1: demodulate the loaded hologram with the background mask,
/// cancel the reference wave, apodize, propagate to the configured
/// distance, and crop back to the region extent.
///
/// A zero diffraction distance means the demodulated field is already in
/// focus; propagation is skipped entirely, not applied with d = 0.
pub fn reconstruct_field(state: &ReconstructionState) -> Result<Array2<Complex<f64>>> {
    let (rows, cols) = working_region(state)?;
    let hologram = crop_region(&state.buffers.hologram, &rows, &cols);

    let mut field = filter::demodulate(&hologram, &state.buffers.fourier_mask);
    field.zip_mut_with(&state.buffers.background_reference, |f, r| *f *= r);

    let pad = state.filter().apodization_pad;
    let apodized = apodize(&field, APODIZATION_SHAPE_FACTOR, pad);

    let distance = state.recon().diffraction_distance;
    let propagated = if distance == 0.0 {
        apodized
    } else {
        let system = state.system();
        let spectrum =
            AngularSpectrum::build(&apodized, system.wavenumber(), system.sample_pitch());
        spectrum.propagate(distance)
    };

    Ok(crop_after_pad(&propagated, pad, (rows.len(), cols.len())))
}

/// Stage 2: derive the output maps from the reconstructed field and
/// publish them into the state buffers.
///
/// height = unwrapped_phase / (2*n*pi / lambda).
pub fn finalize_maps(state: &mut ReconstructionState, field: &Array2<Complex<f64>>) {
    let height_factor = state.system().height_factor();

    state.buffers.intensity_map = field.mapv(|c| (c * c.conj()).re);
    state.buffers.wrapped_phase = field.mapv(|c| c.arg());
    state.buffers.phase_map = unwrap_phase(&state.buffers.wrapped_phase);
    state.buffers.height_map = state.buffers.phase_map.mapv(|p| p / height_factor);
}
