//! Frame list discovery and human-numeric ordering.

use std::path::Path;

use crate::error::{DhmError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "bmp", "jpg", "jpeg"];

/// First embedded integer in a filename, or `i64::MIN` for digitless names
/// so they sort before every numbered frame.
fn numeric_key(name: &str) -> i64 {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .take(18)
        .collect();
    digits.parse().unwrap_or(i64::MIN)
}

/// Sort filenames by embedded frame number, then lexicographically:
/// "2.tiff" precedes "10.tiff".
pub fn human_sort(names: &mut [String]) {
    names.sort_by(|a, b| {
        numeric_key(a)
            .cmp(&numeric_key(b))
            .then_with(|| a.cmp(b))
    });
}

/// List image files in a directory in frame order.
pub fn list_frames(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(DhmError::NotFound(dir.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_image = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            names.push(name);
        }
    }

    human_sort(&mut names);
    Ok(names)
}
