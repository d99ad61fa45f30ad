//! Branch-cut-free 2-D phase unwrapping.
//!
//! The Laplacian of the wrapped phase, computed from wrapped first
//! differences, equals the Laplacian of the true phase. Solving the Poisson
//! equation in the Fourier domain (periodic boundaries) therefore recovers
//! the continuous phase up to an additive constant.
//!
//! Reference: Schofield & Zhu, "Fast phase unwrapping algorithm for
//! interferometric applications", Opt. Lett. 28, 1194 (2003).

use ndarray::Array2;
use num_complex::Complex;

use crate::consts::POISSON_DC_EPSILON;
use crate::fft::{fft2d, ifft2d};

/// Wrap an angle to (-pi, pi].
#[inline]
pub fn wrap(x: f64) -> f64 {
    let mut y = x % std::f64::consts::TAU;
    if y > std::f64::consts::PI {
        y -= std::f64::consts::TAU;
    } else if y < -std::f64::consts::PI {
        y += std::f64::consts::TAU;
    }
    y
}

/// Discrete Laplacian of the wrapped phase using wrapped central
/// differences and periodic neighbors.
fn wrapped_laplacian(phase: &Array2<f64>) -> Array2<f64> {
    let (h, w) = phase.dim();
    let mut lap = Array2::<f64>::zeros((h, w));

    for row in 0..h {
        let up = if row == 0 { h - 1 } else { row - 1 };
        let down = if row + 1 >= h { 0 } else { row + 1 };
        for col in 0..w {
            let left = if col == 0 { w - 1 } else { col - 1 };
            let right = if col + 1 >= w { 0 } else { col + 1 };

            let p = phase[[row, col]];
            let lap_y = wrap(phase[[down, col]] - p) - wrap(p - phase[[up, col]]);
            let lap_x = wrap(phase[[row, right]] - p) - wrap(p - phase[[row, left]]);
            lap[[row, col]] = lap_x + lap_y;
        }
    }

    lap
}

/// Solve del^2 u = f with periodic boundaries by dividing the spectrum by
/// the eigenvalues of the discrete Laplacian. The DC bin is zeroed: the
/// solution is unique only up to a constant.
fn solve_poisson(rhs: &Array2<f64>) -> Array2<f64> {
    let (h, w) = rhs.dim();
    let mut spectrum = fft2d(&rhs.mapv(|v| Complex::new(v, 0.0)));

    for row in 0..h {
        let fy = row as f64 / h as f64;
        let lam_y = 2.0 * ((std::f64::consts::TAU * fy).cos() - 1.0);
        for col in 0..w {
            let fx = col as f64 / w as f64;
            let lam_x = 2.0 * ((std::f64::consts::TAU * fx).cos() - 1.0);

            let lam = lam_x + lam_y;
            if lam.abs() > POISSON_DC_EPSILON {
                spectrum[[row, col]] /= lam;
            } else {
                spectrum[[row, col]] = Complex::new(0.0, 0.0);
            }
        }
    }

    ifft2d(&spectrum).mapv(|c| c.re)
}

/// Unwrap a wrapped phase field. The result is continuous and equals the
/// true phase up to an additive constant (DC offset is discarded by the
/// Poisson solve).
pub fn unwrap_phase(wrapped: &Array2<f64>) -> Array2<f64> {
    solve_poisson(&wrapped_laplacian(wrapped))
}
