//! Mutable session state for one acquisition series.
//!
//! Parameters are grouped into small validated records; the reconstruction
//! functions take them by reference and never reach for hidden globals. The
//! batch controller is the only writer of the output buffers.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use num_complex::Complex;
use tracing::debug;

use crate::consts::{DEFAULT_APODIZATION_PAD, MAP_EXTENSION};
use crate::error::{DhmError, Result};
use crate::filter::{FilterKind, Quadrant};
use crate::io::{frames, image_io};

/// Optical acquisition mode of the microscope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhmMode {
    /// Tilted reference beam; carrier demodulation in the Fourier domain.
    OffAxis,
    /// Collinear beams; volume reconstruction by back-propagation only.
    Inline,
}

impl std::fmt::Display for DhmMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OffAxis => write!(f, "OffAxis"),
            Self::Inline => write!(f, "Inline"),
        }
    }
}

impl std::str::FromStr for DhmMode {
    type Err = DhmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "OffAxis" => Ok(Self::OffAxis),
            "Inline" => Ok(Self::Inline),
            other => Err(DhmError::Parameter(format!(
                "DHM mode must be OffAxis or Inline, got '{other}'"
            ))),
        }
    }
}

/// Validated optical/system parameters. Wavelength is accepted in
/// nanometers and stored in micrometers, matching the pixel pitch unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SystemParams {
    pixel_x: f64,
    pixel_y: f64,
    refractive_index: f64,
    magnification: f64,
    wavelength: f64,
}

impl SystemParams {
    pub fn new(
        pixel_x_um: f64,
        pixel_y_um: f64,
        refractive_index: f64,
        magnification: f64,
        wavelength_nm: f64,
    ) -> Result<Self> {
        for (name, value) in [
            ("pixel_x", pixel_x_um),
            ("pixel_y", pixel_y_um),
            ("refractive_index", refractive_index),
            ("magnification", magnification),
            ("wavelength", wavelength_nm),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(DhmError::Parameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(Self {
            pixel_x: pixel_x_um,
            pixel_y: pixel_y_um,
            refractive_index,
            magnification,
            wavelength: wavelength_nm / 1000.0,
        })
    }

    pub fn pixel_x_um(&self) -> f64 {
        self.pixel_x
    }

    pub fn pixel_y_um(&self) -> f64 {
        self.pixel_y
    }

    pub fn refractive_index(&self) -> f64 {
        self.refractive_index
    }

    pub fn magnification(&self) -> f64 {
        self.magnification
    }

    pub fn wavelength_um(&self) -> f64 {
        self.wavelength
    }

    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength * 1000.0
    }

    /// Effective pixel pitch at the sample plane.
    pub fn sample_pitch(&self) -> f64 {
        self.pixel_x / self.magnification
    }

    /// Propagation wavenumber 2*pi*n / lambda.
    pub fn wavenumber(&self) -> f64 {
        std::f64::consts::TAU * self.refractive_index / self.wavelength
    }

    /// Divides unwrapped phase into physical height: 2*n*pi / lambda.
    pub fn height_factor(&self) -> f64 {
        self.wavenumber()
    }
}

impl Default for SystemParams {
    /// 3.45 um sensor pitch, 20x objective, 635 nm laser in air.
    fn default() -> Self {
        Self {
            pixel_x: 3.45,
            pixel_y: 3.45,
            refractive_index: 1.0,
            magnification: 20.0,
            wavelength: 0.635,
        }
    }
}

/// Spectral filter and apodization settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
    pub kind: FilterKind,
    pub quadrant: Quadrant,
    /// Fraction of the carrier distance in (0, 1].
    pub rate: f64,
    /// Apodization pad width in pixels.
    pub apodization_pad: usize,
}

impl FilterParams {
    pub fn new(kind: FilterKind, quadrant: Quadrant, rate: f64, pad: usize) -> Result<Self> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(DhmError::Parameter(format!(
                "filter rate must be in (0, 1], got {rate}"
            )));
        }
        Ok(Self {
            kind,
            quadrant,
            rate,
            apodization_pad: pad,
        })
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kind: FilterKind::Flat,
            quadrant: Quadrant::One,
            rate: 0.5,
            apodization_pad: DEFAULT_APODIZATION_PAD,
        }
    }
}

/// Reconstruction distances. `diffraction_distance` drives the off-axis
/// single-plane refocus; the z-stack triple drives the in-line sweep.
/// Consumers read only the variant matching the active mode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReconParams {
    pub diffraction_distance: f64,
    pub z_start: f64,
    pub z_end: f64,
    pub z_slices: usize,
}

impl ReconParams {
    /// Distance of z-stack slice `s` (1-based): start + s*(end-start)/qty.
    pub fn slice_distance(&self, slice: usize) -> f64 {
        self.z_start + slice as f64 * (self.z_end - self.z_start) / self.z_slices as f64
    }
}

/// Processing region of interest: rows `top..bottom`, columns
/// `left..right`, half-open, in full-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiRect {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl RoiRect {
    pub fn width(&self) -> usize {
        self.right - self.left
    }

    pub fn height(&self) -> usize {
        self.bottom - self.top
    }

    /// Check the rectangle is non-empty and lies within `height x width`.
    pub fn validate(&self, height: usize, width: usize) -> Result<()> {
        if self.left >= self.right || self.top >= self.bottom {
            return Err(DhmError::Parameter(format!(
                "ROI rectangle is empty: {self:?}"
            )));
        }
        if self.right > width || self.bottom > height {
            return Err(DhmError::Parameter(format!(
                "ROI {self:?} exceeds frame dimensions {height}x{width}"
            )));
        }
        Ok(())
    }
}

/// Which derived maps the batch loop persists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveFlags {
    pub height_map: bool,
    pub phase_map: bool,
    pub wrapped_phase: bool,
    pub inline_volume: bool,
}

impl Default for SaveFlags {
    fn default() -> Self {
        Self {
            height_map: true,
            phase_map: true,
            wrapped_phase: true,
            inline_volume: true,
        }
    }
}

/// Output buffers published by the reconstruction pipeline. Replaced
/// wholesale at each pipeline stage; the host must copy after a checkpoint
/// if it wants a stable snapshot.
#[derive(Clone, Debug, Default)]
pub struct OutputBuffers {
    pub hologram: Array2<f32>,
    pub background: Array2<f32>,
    /// Conjugate unit phasor of the processed background, multiplied into
    /// each demodulated frame to cancel static reference-wave curvature.
    pub background_reference: Array2<Complex<f64>>,
    pub fourier_mask: Array2<f64>,
    pub wrapped_phase: Array2<f64>,
    pub phase_map: Array2<f64>,
    pub height_map: Array2<f64>,
    pub intensity_map: Array2<f64>,
    /// Latest in-line volume slice; the full volume is never held in memory.
    pub volume_slice: Array2<f64>,
}

/// Session state: parameters, file references, frame bookkeeping and
/// output buffers. One instance per active acquisition session.
#[derive(Clone, Debug)]
pub struct ReconstructionState {
    mode: DhmMode,
    read_dir: PathBuf,
    back_path: PathBuf,
    save_dir: Option<PathBuf>,
    frame_list: Vec<String>,
    range_start: usize,
    range_end: usize,
    system: SystemParams,
    filter: FilterParams,
    recon: ReconParams,
    roi: Option<RoiRect>,
    save_flags: SaveFlags,
    background_loaded: bool,
    background_reference_valid: bool,
    pub buffers: OutputBuffers,
}

impl ReconstructionState {
    pub fn new(mode: DhmMode) -> Self {
        Self {
            mode,
            read_dir: PathBuf::new(),
            back_path: PathBuf::new(),
            save_dir: None,
            frame_list: Vec::new(),
            range_start: 0,
            range_end: 0,
            system: SystemParams::default(),
            filter: FilterParams::default(),
            recon: ReconParams::default(),
            roi: None,
            save_flags: SaveFlags::default(),
            background_loaded: false,
            background_reference_valid: false,
            buffers: OutputBuffers::default(),
        }
    }

    pub fn mode(&self) -> DhmMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DhmMode) {
        self.mode = mode;
    }

    // -- file references ----------------------------------------------------

    pub fn read_dir(&self) -> &Path {
        &self.read_dir
    }

    pub fn set_read_dir(&mut self, dir: impl Into<PathBuf>) {
        self.read_dir = dir.into();
        self.frame_list.clear();
    }

    pub fn back_path(&self) -> &Path {
        &self.back_path
    }

    pub fn set_back_path(&mut self, path: impl Into<PathBuf>) {
        self.back_path = path.into();
        self.background_loaded = false;
        self.background_reference_valid = false;
    }

    pub fn save_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref()
    }

    pub fn set_save_dir(&mut self, dir: Option<PathBuf>) {
        self.save_dir = dir;
    }

    // -- frame list ---------------------------------------------------------

    /// Re-scan the read directory, human-sort the frames, and return the
    /// frame count.
    pub fn refresh_frame_list(&mut self) -> Result<usize> {
        self.frame_list = frames::list_frames(&self.read_dir)?;
        debug!(count = self.frame_list.len(), dir = %self.read_dir.display(), "Frame list refreshed");
        Ok(self.frame_list.len())
    }

    pub fn frame_list(&self) -> &[String] {
        &self.frame_list
    }

    pub fn frame_name(&self, index: usize) -> Result<&str> {
        self.frame_list
            .get(index)
            .map(String::as_str)
            .ok_or(DhmError::FrameIndexOutOfRange {
                index,
                total: self.frame_list.len(),
            })
    }

    /// Filename stem used for derived-map output names.
    pub fn frame_stem(&self, index: usize) -> Result<String> {
        let name = self.frame_name(index)?;
        Ok(Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string()))
    }

    // -- parameters ---------------------------------------------------------

    pub fn system(&self) -> &SystemParams {
        &self.system
    }

    pub fn set_system(&mut self, system: SystemParams) {
        self.system = system;
        self.background_reference_valid = false;
    }

    pub fn filter(&self) -> &FilterParams {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterParams) {
        self.filter = filter;
        self.background_reference_valid = false;
    }

    pub fn recon(&self) -> &ReconParams {
        &self.recon
    }

    pub fn set_diffraction_distance(&mut self, distance: f64) {
        self.recon.diffraction_distance = distance;
    }

    /// Current single-plane distance. During an in-line sweep this tracks
    /// the last computed slice, so a host can report the live distance.
    pub fn diffraction_distance(&self) -> f64 {
        self.recon.diffraction_distance
    }

    pub fn set_z_stack(&mut self, start: f64, end: f64, slices: usize) -> Result<()> {
        if slices < 1 {
            return Err(DhmError::Parameter(format!(
                "z-stack slice count must be >= 1, got {slices}"
            )));
        }
        self.recon.z_start = start;
        self.recon.z_end = end;
        self.recon.z_slices = slices;
        Ok(())
    }

    pub fn roi(&self) -> Option<&RoiRect> {
        self.roi.as_ref()
    }

    pub fn set_roi(&mut self, roi: Option<RoiRect>) {
        self.roi = roi;
        self.background_reference_valid = false;
    }

    pub fn save_flags(&self) -> &SaveFlags {
        &self.save_flags
    }

    pub fn set_save_flags(&mut self, flags: SaveFlags) {
        self.save_flags = flags;
    }

    // -- processing range ---------------------------------------------------

    pub fn range(&self) -> (usize, usize) {
        (self.range_start, self.range_end)
    }

    pub fn set_range(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end {
            return Err(DhmError::Parameter(format!(
                "frame range start {start} > end {end}"
            )));
        }
        self.range_start = start;
        self.range_end = end;
        Ok(())
    }

    pub fn set_range_start(&mut self, start: usize) {
        self.range_start = start;
    }

    pub fn set_range_end(&mut self, end: usize) {
        self.range_end = end;
    }

    // -- image buffers ------------------------------------------------------

    pub fn background_loaded(&self) -> bool {
        self.background_loaded
    }

    /// Replace the background buffer wholesale from `back_path`.
    pub fn load_background(&mut self) -> Result<()> {
        self.buffers.background = image_io::load_gray(&self.back_path)?;
        self.background_loaded = true;
        self.background_reference_valid = false;
        Ok(())
    }

    /// Replace the hologram buffer wholesale from the indexed frame file.
    pub fn load_hologram(&mut self, index: usize) -> Result<()> {
        let path = self.read_dir.join(self.frame_name(index)?);
        self.buffers.hologram = image_io::load_gray(&path)?;
        Ok(())
    }

    /// Read a previously written in-line slice back into the volume buffer.
    pub fn load_volume_slice(&mut self, frame_index: usize, slice_index: usize) -> Result<()> {
        let dir = self
            .save_dir
            .as_ref()
            .ok_or_else(|| DhmError::Parameter("no save directory configured".into()))?;
        let path = dir.join(format!(
            "{frame_index}_inline_frame_{slice_index}.{MAP_EXTENSION}"
        ));
        self.buffers.volume_slice = image_io::load_map_f32(&path)?.mapv(f64::from);
        Ok(())
    }

    pub(crate) fn background_reference_valid(&self) -> bool {
        self.background_reference_valid
    }

    pub(crate) fn set_background_reference(&mut self, reference: Array2<Complex<f64>>) {
        self.buffers.background_reference = reference;
        self.background_reference_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_params_reject_nonpositive() {
        assert!(SystemParams::new(0.0, 3.45, 1.0, 20.0, 635.0).is_err());
        assert!(SystemParams::new(3.45, 3.45, 1.0, 20.0, -5.0).is_err());
    }

    #[test]
    fn test_wavelength_stored_in_micrometers() {
        let sys = SystemParams::new(3.45, 3.45, 1.33, 20.0, 635.0).unwrap();
        assert!((sys.wavelength_um() - 0.635).abs() < 1e-12);
        assert!((sys.wavelength_nm() - 635.0).abs() < 1e-9);
    }

    #[test]
    fn test_wavenumber() {
        let sys = SystemParams::new(3.45, 3.45, 1.0, 20.0, 635.0).unwrap();
        let expected = std::f64::consts::TAU / 0.635;
        assert!((sys.wavenumber() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_slice_distance_schedule() {
        let recon = ReconParams {
            diffraction_distance: 0.0,
            z_start: 0.0,
            z_end: 100.0,
            z_slices: 5,
        };
        let distances: Vec<f64> = (1..=5).map(|s| recon.slice_distance(s)).collect();
        assert_eq!(distances, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
    }

    #[test]
    fn test_roi_validation() {
        let roi = RoiRect {
            left: 10,
            right: 100,
            top: 20,
            bottom: 80,
        };
        assert!(roi.validate(200, 200).is_ok());
        assert!(roi.validate(50, 200).is_err());
        let empty = RoiRect {
            left: 10,
            right: 10,
            top: 0,
            bottom: 5,
        };
        assert!(empty.validate(200, 200).is_err());
    }

    #[test]
    fn test_range_rejects_inverted() {
        let mut state = ReconstructionState::new(DhmMode::OffAxis);
        assert!(state.set_range(5, 2).is_err());
        assert!(state.set_range(2, 5).is_ok());
        assert_eq!(state.range(), (2, 5));
    }

    #[test]
    fn test_filter_rate_bounds() {
        use crate::filter::{FilterKind, Quadrant};
        assert!(FilterParams::new(FilterKind::Flat, Quadrant::One, 0.0, 100).is_err());
        assert!(FilterParams::new(FilterKind::Flat, Quadrant::One, 1.5, 100).is_err());
        assert!(FilterParams::new(FilterKind::Hann, Quadrant::Two, 1.0, 100).is_ok());
    }
}
