//! In-line reconstruction: background normalization and a z-stack sweep of
//! back-propagated intensity slices.

use ndarray::Array2;
use num_complex::Complex;
use tracing::debug;

use crate::error::{DhmError, Result};
use crate::propagate::AngularSpectrum;
use crate::state::ReconstructionState;

use super::{crop_region, working_region};

/// Normalize the loaded hologram against the background:
/// (hologram - background) / background, over the processing region.
///
/// No spectral filtering or apodization applies in this mode. Zero
/// background samples would divide to infinity and are substituted with 0.
pub fn normalize(state: &ReconstructionState) -> Result<Array2<Complex<f64>>> {
    if !state.background_loaded() {
        return Err(DhmError::Parameter(
            "in-line reconstruction requires a loaded background hologram".into(),
        ));
    }
    if state.buffers.background.dim() != state.buffers.hologram.dim() {
        return Err(DhmError::Parameter(format!(
            "background dimensions {:?} do not match hologram {:?}",
            state.buffers.background.dim(),
            state.buffers.hologram.dim()
        )));
    }

    let (rows, cols) = working_region(state)?;
    let hologram = crop_region(&state.buffers.hologram, &rows, &cols);
    let background = crop_region(&state.buffers.background, &rows, &cols);

    let (h, w) = hologram.dim();
    let mut cleared = Array2::<Complex<f64>>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let b = background[[row, col]] as f64;
            let value = if b != 0.0 {
                (hologram[[row, col]] as f64 - b) / b
            } else {
                0.0
            };
            cleared[[row, col]] = Complex::new(value, 0.0);
        }
    }

    Ok(cleared)
}

/// Sweep the z-stack: the angular spectrum is built once, then propagated
/// to each slice distance in order. Only the latest intensity slice is
/// retained in the state buffers; `on_slice` receives every slice
/// (0-based index, intensity, distance) for persistence or preview.
///
/// As a side effect the state's current diffraction distance tracks the
/// last computed slice.
pub fn sweep_volume(
    state: &mut ReconstructionState,
    cleared: &Array2<Complex<f64>>,
    mut on_slice: impl FnMut(usize, &Array2<f64>, f64) -> Result<()>,
) -> Result<()> {
    let recon = *state.recon();
    if recon.z_slices < 1 {
        return Err(DhmError::Parameter(
            "in-line sweep requires a z-stack slice count >= 1".into(),
        ));
    }

    let system = state.system();
    let spectrum = AngularSpectrum::build(cleared, system.wavenumber(), system.sample_pitch());

    for slice in 1..=recon.z_slices {
        let distance = recon.slice_distance(slice);
        let field = spectrum.propagate(distance);

        state.set_diffraction_distance(distance);
        state.buffers.volume_slice = field.mapv(|c| (c * c.conj()).re);
        debug!(slice, distance, "Volume slice reconstructed");

        on_slice(slice - 1, &state.buffers.volume_slice, distance)?;
    }

    Ok(())
}
