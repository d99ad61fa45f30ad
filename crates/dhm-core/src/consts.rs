/// Guard band (in pixels) excluded around the DC cross and the outer border
/// during spectral peak search.
pub const SPECTRAL_GUARD_BAND: usize = 30;

/// Divisor applied to the carrier-to-center distance before the filter rate;
/// keeps the mask well inside the first-order lobe.
pub const FILTER_RADIUS_DIVISOR: f64 = 3.0;

/// Shape exponent of the apodization cosine roll-off.
pub const APODIZATION_SHAPE_FACTOR: f64 = 1.5;

/// Default apodization pad width in pixels.
pub const DEFAULT_APODIZATION_PAD: usize = 100;

/// Eigenvalue magnitude below which the Poisson solve treats a frequency bin
/// as the DC component and zeroes it.
pub const POISSON_DC_EPSILON: f64 = 1e-20;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// File extension written for all derived maps.
pub const MAP_EXTENSION: &str = "tiff";
