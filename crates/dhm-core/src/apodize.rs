//! Edge apodization before angular-spectrum propagation.
//!
//! FFT propagation assumes spatial periodicity; the discontinuity between
//! opposite image edges diffracts strongly. The field is padded by edge
//! replication and multiplied with a separable flat-top window: unity over
//! the original extent, cosine^k roll-off spanning exactly the pad region
//! on each side.

use ndarray::{Array1, Array2};
use num_complex::Complex;

/// 1-D flat-top window of length `total` with `pad`-wide roll-offs.
///
/// The roll-off value at the flat-region boundary is exactly 1, so the
/// window is continuous there for any pad >= 1. A NaN from a degenerate
/// zero-length transition is substituted with 0.
pub fn flat_top_window(total: usize, pad: usize, shape_factor: f64) -> Array1<f64> {
    let mut window = Array1::<f64>::ones(total);
    if pad == 0 || total < 2 * pad {
        return window;
    }

    let trail = total - pad - 1;
    for i in 0..total {
        let t = if i < pad {
            (pad - i) as f64 / pad as f64
        } else if i > trail {
            (i - trail) as f64 / pad as f64
        } else {
            continue;
        };
        let v = (std::f64::consts::FRAC_PI_2 * t).cos().powf(shape_factor);
        window[i] = if v.is_nan() { 0.0 } else { v };
    }

    window
}

/// Pad a complex field by replicating its edge values `pad` pixels outward.
pub fn pad_replicate(field: &Array2<Complex<f64>>, pad: usize) -> Array2<Complex<f64>> {
    let (h, w) = field.dim();
    Array2::from_shape_fn((h + 2 * pad, w + 2 * pad), |(row, col)| {
        let src_row = row.saturating_sub(pad).min(h - 1);
        let src_col = col.saturating_sub(pad).min(w - 1);
        field[[src_row, src_col]]
    })
}

/// Pad the field and multiply in the separable flat-top window.
///
/// Output shape is `(h + 2*pad, w + 2*pad)`; the central `h x w` region is
/// unattenuated.
pub fn apodize(
    field: &Array2<Complex<f64>>,
    shape_factor: f64,
    pad: usize,
) -> Array2<Complex<f64>> {
    let mut padded = pad_replicate(field, pad);
    let (ph, pw) = padded.dim();
    let wy = flat_top_window(ph, pad, shape_factor);
    let wx = flat_top_window(pw, pad, shape_factor);

    for row in 0..ph {
        for col in 0..pw {
            padded[[row, col]] *= wy[row] * wx[col];
        }
    }

    padded
}
