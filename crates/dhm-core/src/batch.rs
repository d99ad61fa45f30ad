//! Pause/resume/cancel-aware batch loop over a frame range.
//!
//! The loop is synchronous; the host runs it on a worker thread and owns
//! the cancellation token. Cancellation is cooperative: the token is
//! polled at three checkpoints per frame, never mid-FFT, so a fresh
//! cancellation quiesces within one frame's processing time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info};

use crate::consts::MAP_EXTENSION;
use crate::error::{DhmError, Result};
use crate::io::image_io;
use crate::state::{DhmMode, ReconstructionState};
use crate::reconstruct::{inline, off_axis};

/// Thread-safe cooperative cancellation flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag before resuming a cancelled batch.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Where in a frame's processing a cancellation was honored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    /// Before the frame file was read.
    Load,
    /// After demodulation/propagation (off-axis) or normalization (in-line).
    Transform,
    /// After unwrapping/map derivation (off-axis) or the volume sweep.
    Finalize,
}

impl Checkpoint {
    /// Legacy host exit code for this checkpoint.
    pub fn code(&self) -> i32 {
        match self {
            Self::Load => -1,
            Self::Transform => -2,
            Self::Finalize => -3,
        }
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "before load"),
            Self::Transform => write!(f, "after transform"),
            Self::Finalize => write!(f, "after finalize"),
        }
    }
}

/// Terminal state of one `run_batch` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed {
        frames: usize,
    },
    /// Controlled early exit; not an error. `last_completed` is the last
    /// frame index fully processed by this invocation (None if the first
    /// frame had not completed yet). Resuming is
    /// `set_range_start(last_completed + 1)` plus a token reset.
    Cancelled {
        checkpoint: Checkpoint,
        last_completed: Option<usize>,
    },
}

/// Host-side progress/preview hooks, modeled as a thread-safe observer.
/// All methods default to no-ops.
pub trait BatchObserver: Send + Sync {
    fn frame_started(&self, _index: usize) {}
    fn frame_finished(&self, _index: usize) {}
    fn batch_finished(&self, _outcome: &BatchOutcome) {}
}

/// Observer used when the host does not care about progress.
pub struct NoOpObserver;
impl BatchObserver for NoOpObserver {}

/// Iterate the configured frame range, dispatching the mode-appropriate
/// reconstructor per frame and persisting outputs per the save flags.
///
/// Errors fail fast and halt the series; there is no skip-and-continue.
/// Buffers from the last successfully computed stage remain in the state.
pub fn run_batch(
    state: &mut ReconstructionState,
    token: &CancelToken,
    observer: &dyn BatchObserver,
) -> Result<BatchOutcome> {
    let (start, end) = state.range();
    info!(start, end, mode = %state.mode(), "Batch started");

    if state.frame_list().is_empty() {
        return Err(DhmError::EmptySequence(state.read_dir().to_path_buf()));
    }
    if !state.background_loaded() {
        state.load_background()?;
    }

    let mut last_completed = None;
    for index in start..=end {
        if token.is_cancelled() {
            return finish(observer, cancelled(Checkpoint::Load, last_completed));
        }

        observer.frame_started(index);
        state.load_hologram(index)?;

        let outcome = match state.mode() {
            DhmMode::OffAxis => process_off_axis(state, token, index, last_completed)?,
            DhmMode::Inline => process_inline(state, token, index, last_completed)?,
        };
        if let Some(cancelled) = outcome {
            return finish(observer, cancelled);
        }

        observer.frame_finished(index);
        last_completed = Some(index);
        debug!(index, "Frame complete");
    }

    finish(
        observer,
        BatchOutcome::Completed {
            frames: end - start + 1,
        },
    )
}

fn cancelled(checkpoint: Checkpoint, last_completed: Option<usize>) -> BatchOutcome {
    info!(code = checkpoint.code(), ?last_completed, "Batch cancelled");
    BatchOutcome::Cancelled {
        checkpoint,
        last_completed,
    }
}

fn finish(observer: &dyn BatchObserver, outcome: BatchOutcome) -> Result<BatchOutcome> {
    observer.batch_finished(&outcome);
    Ok(outcome)
}

/// One off-axis frame. Returns Some(outcome) when cancelled mid-frame.
fn process_off_axis(
    state: &mut ReconstructionState,
    token: &CancelToken,
    index: usize,
    last_completed: Option<usize>,
) -> Result<Option<BatchOutcome>> {
    off_axis::ensure_background_reference(state)?;
    let field = off_axis::reconstruct_field(state)?;

    if token.is_cancelled() {
        return Ok(Some(cancelled(Checkpoint::Transform, last_completed)));
    }

    off_axis::finalize_maps(state, &field);

    if token.is_cancelled() {
        return Ok(Some(cancelled(Checkpoint::Finalize, last_completed)));
    }

    save_off_axis_maps(state, index)?;
    Ok(None)
}

/// One in-line frame: normalize, then sweep the z-stack, persisting each
/// slice as it is produced when the volume save flag is set.
fn process_inline(
    state: &mut ReconstructionState,
    token: &CancelToken,
    index: usize,
    last_completed: Option<usize>,
) -> Result<Option<BatchOutcome>> {
    let cleared = inline::normalize(state)?;

    if token.is_cancelled() {
        return Ok(Some(cancelled(Checkpoint::Transform, last_completed)));
    }

    let save_dir = state.save_dir().map(|d| d.to_path_buf());
    let save_slices = state.save_flags().inline_volume;

    inline::sweep_volume(state, &cleared, |slice, intensity, _distance| {
        if !save_slices {
            return Ok(());
        }
        if let Some(dir) = &save_dir {
            let path = dir.join(format!("{index}_inline_frame_{slice}.{MAP_EXTENSION}"));
            image_io::save_map_f32(&path, &intensity.mapv(|v| v as f32))?;
        }
        Ok(())
    })?;

    if token.is_cancelled() {
        return Ok(Some(cancelled(Checkpoint::Finalize, last_completed)));
    }

    Ok(None)
}

fn save_off_axis_maps(state: &ReconstructionState, index: usize) -> Result<()> {
    let Some(dir) = state.save_dir() else {
        return Ok(());
    };
    let stem = state.frame_stem(index)?;
    let flags = state.save_flags();

    let jobs: [(bool, &str, &Array2<f64>); 3] = [
        (flags.height_map, "height_map", &state.buffers.height_map),
        (flags.phase_map, "phase_map", &state.buffers.phase_map),
        (
            flags.wrapped_phase,
            "wrapped_phase",
            &state.buffers.wrapped_phase,
        ),
    ];
    for (enabled, kind, data) in jobs {
        if enabled {
            let path = dir.join(format!("{stem}_{kind}.{MAP_EXTENSION}"));
            image_io::save_map_f32(&path, &data.mapv(|v| v as f32))?;
        }
    }
    Ok(())
}

/// Output buffer kinds a host can persist as a live preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    HeightMap,
    PhaseMap,
    WrappedPhase,
    IntensityMap,
    VolumeSlice,
}

impl MapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeightMap => "height_map",
            Self::PhaseMap => "phase_map",
            Self::WrappedPhase => "wrapped_phase",
            Self::IntensityMap => "intensity_map",
            Self::VolumeSlice => "volume_slice",
        }
    }
}

/// Persist the current content of one output buffer as
/// `live_save_<index>_<kind>.tiff` in the save directory.
pub fn save_live_preview(
    state: &ReconstructionState,
    index: usize,
    kind: MapKind,
) -> Result<()> {
    let Some(dir) = state.save_dir() else {
        return Ok(());
    };
    let data = match kind {
        MapKind::HeightMap => &state.buffers.height_map,
        MapKind::PhaseMap => &state.buffers.phase_map,
        MapKind::WrappedPhase => &state.buffers.wrapped_phase,
        MapKind::IntensityMap => &state.buffers.intensity_map,
        MapKind::VolumeSlice => &state.buffers.volume_slice,
    };
    let path = dir.join(format!(
        "live_save_{index}_{}.{MAP_EXTENSION}",
        kind.as_str()
    ));
    image_io::save_map_f32(&path, &data.mapv(|v| v as f32))
}
