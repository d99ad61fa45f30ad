//! Shared 2-D FFT helpers used by spectral filtering, propagation and
//! phase unwrapping.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Promote a real image to a complex field with zero imaginary part.
pub fn to_complex(data: &Array2<f32>) -> Array2<Complex<f64>> {
    data.mapv(|v| Complex::new(v as f64, 0.0))
}

/// 2D FFT: row-wise FFT, then column-wise FFT. Rows and columns are
/// processed in parallel for large images.
pub fn fft2d(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    let mut result = data.clone();

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        process_rows_parallel(&mut result, &fft_row);
        process_cols_parallel(&mut result, &fft_col);
    } else {
        process_rows(&mut result, &fft_row);
        process_cols(&mut result, &fft_col);
    }

    result
}

/// Inverse 2D FFT with 1/(h*w) normalization.
pub fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        process_cols_parallel(&mut work, &ifft_col);
        process_rows_parallel(&mut work, &ifft_row);
    } else {
        process_cols(&mut work, &ifft_col);
        process_rows(&mut work, &ifft_row);
    }

    let scale = 1.0 / (h * w) as f64;
    work.mapv_inplace(|v| v * scale);
    work
}

fn process_rows(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let (h, w) = data.dim();
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| data[[row, c]]).collect();
        fft.process(&mut row_data);
        for col in 0..w {
            data[[row, col]] = row_data[col];
        }
    }
}

fn process_cols(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let (h, w) = data.dim();
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| data[[r, col]]).collect();
        fft.process(&mut col_data);
        for row in 0..h {
            data[[row, col]] = col_data[row];
        }
    }
}

fn process_rows_parallel(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let (h, w) = data.dim();
    let processed: Vec<Vec<Complex<f64>>> = (0..h)
        .into_par_iter()
        .map(|row| {
            let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| data[[row, c]]).collect();
            fft.process(&mut row_data);
            row_data
        })
        .collect();
    for (row, row_data) in processed.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            data[[row, col]] = val;
        }
    }
}

fn process_cols_parallel(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let (h, w) = data.dim();
    let processed: Vec<Vec<Complex<f64>>> = (0..w)
        .into_par_iter()
        .map(|col| {
            let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| data[[r, col]]).collect();
            fft.process(&mut col_data);
            col_data
        })
        .collect();
    for (col, col_data) in processed.into_iter().enumerate() {
        for (row, val) in col_data.into_iter().enumerate() {
            data[[row, col]] = val;
        }
    }
}

/// Move the zero-frequency bin to the center of the spectrum.
pub fn fftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (h, w) = data.dim();
    roll(data, h / 2, w / 2)
}

/// Undo `fftshift`. Identical to it for even extents, differs for odd ones.
pub fn ifftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (h, w) = data.dim();
    roll(data, h - h / 2, w - w / 2)
}

/// Circular shift by (rows, cols).
fn roll<T: Clone>(data: &Array2<T>, by_row: usize, by_col: usize) -> Array2<T> {
    let (h, w) = data.dim();
    let mut out = data.clone();
    for row in 0..h {
        for col in 0..w {
            out[[(row + by_row) % h, (col + by_col) % w]] = data[[row, col]].clone();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_roundtrip_even_and_odd() {
        for (h, w) in [(4, 6), (5, 7), (4, 5)] {
            let data = Array2::from_shape_fn((h, w), |(r, c)| (r * w + c) as f64);
            let back = ifftshift(&fftshift(&data));
            assert_eq!(data, back);
        }
    }

    #[test]
    fn test_fftshift_moves_dc_to_center() {
        let mut data = Array2::from_elem((4, 4), Complex::new(0.0, 0.0));
        data[[0, 0]] = Complex::new(1.0, 0.0);
        let shifted = fftshift(&data);
        assert_eq!(shifted[[2, 2]], Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_fft_ifft_roundtrip() {
        let data = Array2::from_shape_fn((8, 6), |(r, c)| {
            Complex::new((r as f64 * 0.3).sin(), (c as f64 * 0.7).cos())
        });
        let back = ifft2d(&fft2d(&data));
        for (a, b) in data.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn test_parallel_path_matches_sequential() {
        let (h, w) = (8, 8);
        let data = Array2::from_shape_fn((h, w), |(r, c)| {
            Complex::new((r as f64 - 3.0) * 0.4, (c as f64 + 1.0) * 0.2)
        });
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(w);

        let mut seq = data.clone();
        process_rows(&mut seq, &fft);
        let mut par = data.clone();
        process_rows_parallel(&mut par, &fft);

        assert_eq!(seq, par);
    }
}
