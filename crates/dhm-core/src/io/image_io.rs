//! Hologram decoding and 32-bit float map persistence.
//!
//! Source holograms arrive as ordinary 8/16-bit grayscale images and are
//! decoded through the `image` crate. Derived maps (phase, height,
//! intensity) carry physical quantities and are written as Gray32Float
//! TIFF through the `tiff` crate, which `image` cannot round-trip for
//! grayscale data.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use image::ImageError;
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

use crate::error::{DhmError, Result};

/// Decode a grayscale hologram into raw f32 samples normalized to [0, 1].
///
/// A missing file and an undecodable file are distinct failure kinds;
/// callers rely on that to tell a moved series from a corrupt frame.
pub fn load_gray(path: &Path) -> Result<Array2<f32>> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(ImageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DhmError::NotFound(path.to_path_buf()));
        }
        Err(ImageError::IoError(e)) => return Err(DhmError::Io(e)),
        Err(e) => {
            return Err(DhmError::Format {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = Array2::<f32>::zeros((h as usize, w as usize));
    for row in 0..h as usize {
        for col in 0..w as usize {
            let pixel = gray.get_pixel(col as u32, row as u32);
            data[[row, col]] = pixel.0[0] as f32 / 65535.0;
        }
    }

    Ok(data)
}

/// Write a derived map as a single-page Gray32Float TIFF.
pub fn save_map_f32(path: &Path, data: &Array2<f32>) -> Result<()> {
    let (h, w) = data.dim();
    let samples: Vec<f32> = data.iter().copied().collect();

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| DhmError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    encoder
        .write_image::<colortype::Gray32Float>(w as u32, h as u32, &samples)
        .map_err(|e| DhmError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(())
}

/// Read back a Gray32Float TIFF written by [`save_map_f32`].
pub fn load_map_f32(path: &Path) -> Result<Array2<f32>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DhmError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(DhmError::Io(e)),
    };

    let format_err = |reason: String| DhmError::Format {
        path: path.to_path_buf(),
        reason,
    };

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| format_err(e.to_string()))?;
    let (w, h) = decoder
        .dimensions()
        .map_err(|e| format_err(e.to_string()))?;
    let image = decoder
        .read_image()
        .map_err(|e| format_err(e.to_string()))?;

    let samples = match image {
        DecodingResult::F32(buf) => buf,
        other => {
            return Err(format_err(format!(
                "expected 32-bit float samples, got {:?}",
                std::mem::discriminant(&other)
            )));
        }
    };

    Array2::from_shape_vec((h as usize, w as usize), samples)
        .map_err(|e| format_err(e.to_string()))
}
