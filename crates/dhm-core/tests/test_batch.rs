mod common;

use std::sync::Mutex;

use common::{carrier_hologram, write_gray_u16};
use dhm_core::batch::{self, BatchObserver, BatchOutcome, CancelToken, Checkpoint, NoOpObserver};
use dhm_core::filter::{FilterKind, Quadrant};
use dhm_core::state::{DhmMode, FilterParams, ReconstructionState, SaveFlags};
use ndarray::Array2;
use tempfile::TempDir;

/// A series of small in-line frames, each a flat background with one
/// frame-specific bright pixel.
fn inline_series(frame_count: usize) -> (TempDir, ReconstructionState) {
    let n = 32;
    let dir = TempDir::new().unwrap();
    let frames = dir.path().join("frames");
    let out = dir.path().join("out");
    std::fs::create_dir(&frames).unwrap();
    std::fs::create_dir(&out).unwrap();

    let background = Array2::from_elem((n, n), 0.5f32);
    write_gray_u16(&dir.path().join("background.tiff"), &background);
    for i in 0..frame_count {
        let mut holo = background.clone();
        holo[[n / 2, i % n]] = 0.9;
        write_gray_u16(&frames.join(format!("{i}.tiff")), &holo);
    }

    let mut state = ReconstructionState::new(DhmMode::Inline);
    state.set_read_dir(&frames);
    state.set_back_path(dir.path().join("background.tiff"));
    state.set_save_dir(Some(out));
    state.set_z_stack(10.0, 50.0, 2).unwrap();
    state.refresh_frame_list().unwrap();
    state.set_range(0, frame_count - 1).unwrap();

    (dir, state)
}

/// Cancels the shared token once a chosen frame completes, recording every
/// completed index on the way.
struct CancelAfter {
    token: CancelToken,
    after: usize,
    completed: Mutex<Vec<usize>>,
}

impl BatchObserver for CancelAfter {
    fn frame_finished(&self, index: usize) {
        self.completed.lock().unwrap().push(index);
        if index == self.after {
            self.token.cancel();
        }
    }
}

/// Property: cancel mid-series, resume from the reported index with a
/// reset token, and the two runs together produce exactly the output of an
/// uninterrupted run with no frame processed twice.
#[test]
fn test_pause_and_resume_covers_series_exactly_once() {
    let (dir, mut state) = inline_series(10);
    let out = dir.path().join("out");

    let token = CancelToken::new();
    let observer = CancelAfter {
        token: token.clone(),
        after: 3,
        completed: Mutex::new(Vec::new()),
    };

    let outcome = batch::run_batch(&mut state, &token, &observer).unwrap();
    assert_eq!(
        outcome,
        BatchOutcome::Cancelled {
            checkpoint: Checkpoint::Load,
            last_completed: Some(3),
        }
    );

    // Resume exactly where the outcome says.
    token.reset();
    state.set_range(4, 9).unwrap();
    let outcome = batch::run_batch(&mut state, &token, &observer).unwrap();
    assert_eq!(outcome, BatchOutcome::Completed { frames: 6 });

    assert_eq!(*observer.completed.lock().unwrap(), (0..10).collect::<Vec<_>>());

    // Every frame left both of its slices on disk, once.
    for frame in 0..10 {
        for slice in 0..2 {
            let path = out.join(format!("{frame}_inline_frame_{slice}.tiff"));
            assert!(path.is_file(), "missing {}", path.display());
        }
    }
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 20);
}

#[test]
fn test_cancel_before_first_frame_reports_no_progress() {
    let (_dir, mut state) = inline_series(3);

    let token = CancelToken::new();
    token.cancel();
    let outcome = batch::run_batch(&mut state, &token, &NoOpObserver).unwrap();

    assert_eq!(
        outcome,
        BatchOutcome::Cancelled {
            checkpoint: Checkpoint::Load,
            last_completed: None,
        }
    );
}

#[test]
fn test_volume_save_flag_suppresses_slice_files() {
    let (dir, mut state) = inline_series(2);
    state.set_save_flags(SaveFlags {
        inline_volume: false,
        ..SaveFlags::default()
    });

    let token = CancelToken::new();
    batch::run_batch(&mut state, &token, &NoOpObserver).unwrap();

    assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
}

#[test]
fn test_off_axis_batch_writes_named_maps() {
    let n = 160;
    let dir = TempDir::new().unwrap();
    let frames = dir.path().join("frames");
    let out = dir.path().join("out");
    std::fs::create_dir(&frames).unwrap();
    std::fs::create_dir(&out).unwrap();

    write_gray_u16(
        &dir.path().join("background.tiff"),
        &carrier_hologram(n, -40, 40, None),
    );
    write_gray_u16(
        &frames.join("sample_01.tiff"),
        &carrier_hologram(n, -40, 40, None),
    );

    let mut state = ReconstructionState::new(DhmMode::OffAxis);
    state.set_read_dir(&frames);
    state.set_back_path(dir.path().join("background.tiff"));
    state.set_save_dir(Some(out.clone()));
    state.set_filter(FilterParams::new(FilterKind::Flat, Quadrant::One, 0.9, 10).unwrap());
    state.refresh_frame_list().unwrap();
    state.set_range(0, 0).unwrap();
    state.set_save_flags(SaveFlags {
        wrapped_phase: false,
        ..SaveFlags::default()
    });

    let token = CancelToken::new();
    let outcome = batch::run_batch(&mut state, &token, &NoOpObserver).unwrap();
    assert_eq!(outcome, BatchOutcome::Completed { frames: 1 });

    assert!(out.join("sample_01_height_map.tiff").is_file());
    assert!(out.join("sample_01_phase_map.tiff").is_file());
    assert!(!out.join("sample_01_wrapped_phase.tiff").exists());
}

#[test]
fn test_slices_round_trip_through_volume_buffer() {
    let (_dir, mut state) = inline_series(1);

    let token = CancelToken::new();
    batch::run_batch(&mut state, &token, &NoOpObserver).unwrap();
    let last = state.buffers.volume_slice.clone();

    // Slice 1 was the last one written; reading it back reproduces the
    // buffer within f32 storage precision.
    state.load_volume_slice(0, 1).unwrap();
    assert_eq!(state.buffers.volume_slice.dim(), (32, 32));
    for (a, b) in state.buffers.volume_slice.iter().zip(last.iter()) {
        assert!((a - b).abs() < 1e-6);
    }

    state.load_volume_slice(0, 7).unwrap_err();
}

#[test]
fn test_live_preview_snapshot() {
    let (dir, mut state) = inline_series(1);

    let token = CancelToken::new();
    batch::run_batch(&mut state, &token, &NoOpObserver).unwrap();
    batch::save_live_preview(&state, 0, batch::MapKind::VolumeSlice).unwrap();

    assert!(dir
        .path()
        .join("out")
        .join("live_save_0_volume_slice.tiff")
        .is_file());
}

#[test]
fn test_empty_series_is_rejected() {
    let (dir, mut state) = inline_series(1);
    std::fs::remove_file(dir.path().join("frames").join("0.tiff")).unwrap();
    state.refresh_frame_list().unwrap();

    let token = CancelToken::new();
    let err = batch::run_batch(&mut state, &token, &NoOpObserver).unwrap_err();
    assert!(matches!(err, dhm_core::error::DhmError::EmptySequence(_)));
}

#[test]
fn test_missing_frame_file_fails_fast() {
    let (dir, mut state) = inline_series(3);
    std::fs::remove_file(dir.path().join("frames").join("1.tiff")).unwrap();
    state.refresh_frame_list().unwrap();
    state.set_range(0, 2).unwrap();

    let token = CancelToken::new();
    // Only 2 frames remain; index 2 is out of range.
    assert!(batch::run_batch(&mut state, &token, &NoOpObserver).is_err());
}
