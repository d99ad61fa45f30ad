//! Shared synthetic hologram generators for integration tests.
#![allow(dead_code)]

use std::path::Path;

use image::{ImageBuffer, Luma};
use ndarray::Array2;

/// Off-axis carrier fringes: 0.5 + 0.25*cos(2*pi*(dr*r + dc*c)/n + phase).
///
/// In the center-shifted spectrum the +1 order lands `(dr, dc)` bins away
/// from the DC term.
pub fn carrier_hologram(n: usize, dr: i64, dc: i64, phase: Option<&Array2<f64>>) -> Array2<f32> {
    Array2::from_shape_fn((n, n), |(r, c)| {
        let arg = std::f64::consts::TAU * (dr as f64 * r as f64 + dc as f64 * c as f64)
            / n as f64
            + phase.map_or(0.0, |p| p[[r, c]]);
        (0.5 + 0.25 * arg.cos()) as f32
    })
}

/// Smooth Gaussian phase bump of the given peak amplitude (radians),
/// centered in an n x n frame, decaying to ~0 at the borders.
pub fn gaussian_phase(n: usize, amplitude: f64, sigma: f64) -> Array2<f64> {
    let mid = n as f64 / 2.0;
    Array2::from_shape_fn((n, n), |(r, c)| {
        let dr = (r as f64 - mid) / sigma;
        let dc = (c as f64 - mid) / sigma;
        amplitude * (-(dr * dr + dc * dc) / 2.0).exp()
    })
}

/// Write a [0, 1] float image as 16-bit grayscale TIFF, the format the
/// hologram loader expects from a camera dump.
pub fn write_gray_u16(path: &Path, data: &Array2<f32>) {
    let (h, w) = data.dim();
    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            pixels.push((data[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
        }
    }
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path).expect("write test image");
}
