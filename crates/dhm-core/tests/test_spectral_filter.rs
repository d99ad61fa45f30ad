mod common;

use common::carrier_hologram;
use dhm_core::filter::{locate_and_mask, locate_peak, FilterKind, Quadrant};

const N: usize = 256;

/// Property: for a synthetic single-frequency carrier the located peak
/// matches the injected carrier bin within one pixel, in every quadrant.
#[test]
fn test_peak_located_in_all_four_quadrants() {
    let center = N as i64 / 2;
    // (quadrant, carrier offset from DC in bins)
    let cases = [
        (Quadrant::One, -50, 60),
        (Quadrant::Two, -50, -60),
        (Quadrant::Three, 50, -60),
        (Quadrant::Four, 50, 60),
    ];

    for (quadrant, dr, dc) in cases {
        let holo = carrier_hologram(N, dr, dc, None);
        let peak = locate_peak(&holo, quadrant).unwrap();
        let expected_row = (center + dr) as f64;
        let expected_col = (center + dc) as f64;
        assert!(
            (peak.row as f64 - expected_row).abs() <= 1.0,
            "quadrant {quadrant}: row {} vs expected {expected_row}",
            peak.row
        );
        assert!(
            (peak.col as f64 - expected_col).abs() <= 1.0,
            "quadrant {quadrant}: col {} vs expected {expected_col}",
            peak.col
        );
    }
}

#[test]
fn test_mask_radius_scales_with_filter_rate() {
    let holo = carrier_hologram(N, -48, 64, None);
    let full = locate_and_mask(&holo, Quadrant::One, 1.0, FilterKind::Flat).unwrap();
    let half = locate_and_mask(&holo, Quadrant::One, 0.5, FilterKind::Flat).unwrap();

    // distance = sqrt(48^2 + 64^2) = 80; radius = 80/3 * rate
    assert_eq!(full.radius, 26);
    assert_eq!(half.radius, 13);
    assert!(full.mask.sum() > half.mask.sum());
}

#[test]
fn test_flat_mask_is_binary_disk_around_peak() {
    let holo = carrier_hologram(N, -48, 64, None);
    let sm = locate_and_mask(&holo, Quadrant::One, 0.9, FilterKind::Flat).unwrap();

    assert_eq!(sm.mask.dim(), (N, N));
    assert_eq!(sm.mask[[sm.peak.row, sm.peak.col]], 1.0);
    // Far corner is outside any sane mask.
    assert_eq!(sm.mask[[N - 1, 0]], 0.0);
    assert!(sm.mask.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_hann_mask_tapers_toward_disk_edge() {
    let holo = carrier_hologram(N, -48, 64, None);
    let flat = locate_and_mask(&holo, Quadrant::One, 0.9, FilterKind::Flat).unwrap();
    let hann = locate_and_mask(&holo, Quadrant::One, 0.9, FilterKind::Hann).unwrap();

    // Tapered mask never exceeds the binary disk and attenuates its rim.
    for (h, f) in hann.mask.iter().zip(flat.mask.iter()) {
        assert!(h <= f);
    }
    let rim_row = hann.peak.row;
    let rim_col = hann.peak.col + hann.radius - 1;
    assert!(hann.mask[[rim_row, rim_col]] < 0.5);
    // Center of the disk stays close to unity.
    assert!(hann.mask[[hann.peak.row, hann.peak.col]] > 0.9);
}

#[test]
fn test_too_small_hologram_is_rejected() {
    let holo = carrier_hologram(64, -10, 10, None);
    assert!(locate_peak(&holo, Quadrant::One).is_err());
}
