//! Config receipt persistence.
//!
//! The receipt is a sectioned key/value TOML document capturing everything
//! needed to reproduce a reconstruction run. Wavelength is written in
//! nanometers and the filter rate as a percentage for operator readability;
//! the processing range is stored 1-based.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DhmError, Result};
use crate::filter::{FilterKind, Quadrant};
use crate::state::{DhmMode, FilterParams, ReconstructionState, SaveFlags, SystemParams};

const RECEIPT_EXTENSION: &str = "toml";

#[derive(Debug, Serialize, Deserialize)]
struct ConfigReceipt {
    #[serde(rename = "DHM_Mode")]
    dhm_mode: ModeSection,
    #[serde(rename = "File_Paths")]
    file_paths: FilePathsSection,
    #[serde(rename = "System_Parameters")]
    system_parameters: SystemSection,
    #[serde(rename = "Reconstruction_Parameters")]
    reconstruction_parameters: ReconSection,
    #[serde(rename = "Filter_Parameters")]
    filter_parameters: FilterSection,
    #[serde(rename = "Save_Flags")]
    save_flags: SaveSection,
    #[serde(rename = "Processing_Range")]
    processing_range: RangeSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModeSection {
    mode: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FilePathsSection {
    read_path_main: String,
    read_path_back: String,
    save_path_main: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SystemSection {
    pixel_x_main: f64,
    pixel_y_main: f64,
    refractive_index_main: f64,
    magnification_main: f64,
    /// Nanometers on disk; micrometers in memory.
    wavelength_main: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReconSection {
    diffraction_distance: f64,
    rec_start: f64,
    rec_end: f64,
    rec_zstack_qty: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FilterSection {
    filter_type_main: String,
    filter_quadrant_main: String,
    /// Percentage on disk; fraction in memory.
    filter_rate_main: f64,
    apo_pad_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveSection {
    height_map_save: bool,
    phase_map_save: bool,
    wrapped_phase_save: bool,
    inline_save: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct RangeSection {
    /// 1-based inclusive on disk; 0-based in memory, clamped to >= 0.
    process_range_start: i64,
    process_range_end: i64,
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(RECEIPT_EXTENSION) => Ok(()),
        other => Err(DhmError::Config(format!(
            "config receipt must have a .{RECEIPT_EXTENSION} extension, got {:?} ({})",
            other,
            path.display()
        ))),
    }
}

fn to_receipt(state: &ReconstructionState) -> ConfigReceipt {
    let system = state.system();
    let filter = state.filter();
    let recon = state.recon();
    let flags = state.save_flags();
    let (start, end) = state.range();

    ConfigReceipt {
        dhm_mode: ModeSection {
            mode: state.mode().to_string(),
        },
        file_paths: FilePathsSection {
            read_path_main: state.read_dir().to_string_lossy().into_owned(),
            read_path_back: state.back_path().to_string_lossy().into_owned(),
            save_path_main: state
                .save_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        },
        system_parameters: SystemSection {
            pixel_x_main: system.pixel_x_um(),
            pixel_y_main: system.pixel_y_um(),
            refractive_index_main: system.refractive_index(),
            magnification_main: system.magnification(),
            wavelength_main: system.wavelength_nm(),
        },
        reconstruction_parameters: ReconSection {
            diffraction_distance: recon.diffraction_distance,
            rec_start: recon.z_start,
            rec_end: recon.z_end,
            rec_zstack_qty: recon.z_slices as u64,
        },
        filter_parameters: FilterSection {
            filter_type_main: filter.kind.to_string(),
            filter_quadrant_main: filter.quadrant.to_string(),
            filter_rate_main: filter.rate * 100.0,
            apo_pad_size: filter.apodization_pad as u64,
        },
        save_flags: SaveSection {
            height_map_save: flags.height_map,
            phase_map_save: flags.phase_map,
            wrapped_phase_save: flags.wrapped_phase,
            inline_save: flags.inline_volume,
        },
        processing_range: RangeSection {
            process_range_start: start as i64 + 1,
            process_range_end: end as i64 + 1,
        },
    }
}

fn from_receipt(receipt: &ConfigReceipt) -> Result<ReconstructionState> {
    let mode = DhmMode::from_str(&receipt.dhm_mode.mode)?;
    let mut state = ReconstructionState::new(mode);

    state.set_read_dir(&receipt.file_paths.read_path_main);
    state.set_back_path(&receipt.file_paths.read_path_back);
    if receipt.file_paths.save_path_main.is_empty() {
        state.set_save_dir(None);
    } else {
        state.set_save_dir(Some(receipt.file_paths.save_path_main.clone().into()));
    }

    let sys = &receipt.system_parameters;
    state.set_system(SystemParams::new(
        sys.pixel_x_main,
        sys.pixel_y_main,
        sys.refractive_index_main,
        sys.magnification_main,
        sys.wavelength_main,
    )?);

    let rec = &receipt.reconstruction_parameters;
    state.set_diffraction_distance(rec.diffraction_distance);
    if rec.rec_zstack_qty >= 1 {
        state.set_z_stack(rec.rec_start, rec.rec_end, rec.rec_zstack_qty as usize)?;
    }

    let filt = &receipt.filter_parameters;
    state.set_filter(FilterParams::new(
        FilterKind::from_str(&filt.filter_type_main)?,
        Quadrant::from_str(&filt.filter_quadrant_main)?,
        filt.filter_rate_main / 100.0,
        filt.apo_pad_size as usize,
    )?);

    state.set_save_flags(SaveFlags {
        height_map: receipt.save_flags.height_map_save,
        phase_map: receipt.save_flags.phase_map_save,
        wrapped_phase: receipt.save_flags.wrapped_phase_save,
        inline_volume: receipt.save_flags.inline_save,
    });

    let range = &receipt.processing_range;
    if range.process_range_start > range.process_range_end {
        return Err(DhmError::Config(format!(
            "processing range start {} > end {}",
            range.process_range_start, range.process_range_end
        )));
    }
    let start = (range.process_range_start - 1).max(0) as usize;
    let end = (range.process_range_end - 1).max(0) as usize;
    state.set_range(start, end)?;

    Ok(state)
}

/// Serialize the state to a config receipt at `path`.
pub fn store(state: &ReconstructionState, path: &Path) -> Result<()> {
    check_extension(path)?;
    let receipt = to_receipt(state);
    let text = toml::to_string_pretty(&receipt)
        .map_err(|e| DhmError::Config(format!("failed to serialize receipt: {e}")))?;
    std::fs::write(path, text)?;
    info!(path = %path.display(), "Config receipt written");
    Ok(())
}

/// Load a config receipt into a fresh state. The frame list is not
/// refreshed here; callers re-scan the read directory before a batch run.
pub fn load(path: &Path) -> Result<ReconstructionState> {
    check_extension(path)?;
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DhmError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(DhmError::Io(e)),
    };
    let receipt: ConfigReceipt = toml::from_str(&text)
        .map_err(|e| DhmError::Config(format!("malformed receipt {}: {e}", path.display())))?;
    from_receipt(&receipt)
}
