//! Angular-spectrum wavefield propagation.
//!
//! The field is decomposed into plane waves in the Fourier domain. Each
//! propagating mode accumulates a phase exp(i*kz*d) over a distance d;
//! evanescent modes (kz imaginary) carry no energy to the target plane and
//! are masked out rather than evaluated.

use ndarray::{Array1, Array2};
use num_complex::Complex;

use crate::fft::{fft2d, fftshift, ifft2d, ifftshift};

/// Precomputed spectrum, longitudinal wavenumber grid and propagating-mode
/// mask for one field. Built once per frame, reused for every distance in a
/// z-stack sweep.
#[derive(Clone, Debug)]
pub struct AngularSpectrum {
    /// Center-shifted 2-D Fourier transform of the field.
    pub spectrum: Array2<Complex<f64>>,
    /// kz = sqrt(k^2 - kx^2 - ky^2) where real, 0 where evanescent.
    pub kz: Array2<f64>,
    /// True for physically propagating (non-evanescent) plane waves.
    pub mask: Array2<bool>,
}

/// Spatial-frequency axis with `n` samples over an extent of `n * pitch`.
fn frequency_axis(n: usize, pitch: f64) -> Array1<f64> {
    let extent = n as f64 * pitch;
    let k_max = std::f64::consts::PI * (n / 2) as f64 / (extent / 2.0);
    Array1::linspace(-k_max, k_max, n)
}

impl AngularSpectrum {
    /// Transform the field and build the kz/mask grids. Rectangular images
    /// are supported; the two axes are sampled independently.
    pub fn build(field: &Array2<Complex<f64>>, wavenumber: f64, sample_pitch: f64) -> Self {
        let spectrum = fftshift(&fft2d(field));
        let (h, w) = spectrum.dim();

        let kx = frequency_axis(w, sample_pitch);
        let ky = frequency_axis(h, sample_pitch);

        let mut kz = Array2::<f64>::zeros((h, w));
        let mut mask = Array2::<bool>::from_elem((h, w), false);
        let k2 = wavenumber * wavenumber;
        for row in 0..h {
            for col in 0..w {
                let arg = k2 - kx[col] * kx[col] - ky[row] * ky[row];
                if arg > 0.0 {
                    kz[[row, col]] = arg.sqrt();
                    mask[[row, col]] = true;
                }
            }
        }

        Self { spectrum, kz, mask }
    }

    /// Propagate by `distance` (negative values back-propagate): multiply
    /// the masked spectrum by the propagation phase, zero evanescent modes,
    /// inverse-shift and inverse-transform.
    pub fn propagate(&self, distance: f64) -> Array2<Complex<f64>> {
        let (h, w) = self.spectrum.dim();
        let mut core = Array2::<Complex<f64>>::zeros((h, w));
        for row in 0..h {
            for col in 0..w {
                if self.mask[[row, col]] {
                    let phase = Complex::from_polar(1.0, self.kz[[row, col]] * distance);
                    core[[row, col]] = self.spectrum[[row, col]] * phase;
                }
            }
        }
        ifft2d(&ifftshift(&core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_axis_symmetric() {
        let kx = frequency_axis(64, 0.5);
        assert!((kx[0] + kx[63]).abs() < 1e-12);
        assert!(kx[0] < 0.0 && kx[63] > 0.0);
    }

    #[test]
    fn test_mask_zeroes_evanescent_kz() {
        // Small wavenumber: high spatial frequencies must be evanescent.
        let field = Array2::from_elem((32, 32), Complex::new(1.0, 0.0));
        let spec = AngularSpectrum::build(&field, 1.0, 0.5);
        assert!(spec.mask[[16, 16]]);
        assert!(!spec.mask[[0, 0]]);
        assert_eq!(spec.kz[[0, 0]], 0.0);
    }

    #[test]
    fn test_zero_distance_preserves_dc_field() {
        let field = Array2::from_elem((16, 16), Complex::new(2.0, 0.0));
        let spec = AngularSpectrum::build(&field, 10.0, 0.5);
        let out = spec.propagate(0.0);
        for (a, b) in field.iter().zip(out.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }
}
