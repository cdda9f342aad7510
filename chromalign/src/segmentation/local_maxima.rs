//! Local maxima detection with a minimum peak spacing.
//!
//! 1. A voxel is a candidate when it equals the maximum of its
//!    `(2 * min_distance + 1)` cube and exceeds `threshold_abs`.
//! 2. Candidates within `min_distance` of the border are dropped on request.
//! 3. Candidates are visited by descending intensity; a candidate closer than
//!    or at `min_distance` (Chebyshev) to an already kept peak is suppressed.
//!    This also collapses flat plateaus to a single peak.

use common::buffer3::Buffer3;

use super::morphology::filter_axis;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    coords: [usize; 3],
    value: f32,
}

// ============================================================================
// Detection
// ============================================================================

/// Find local intensity maxima in `volume`.
///
/// # Arguments
/// * `volume` - Smoothed intensity volume
/// * `min_distance` - Minimum separation between peaks, in voxels
/// * `threshold_abs` - Peaks must be strictly brighter than this
/// * `exclude_border` - Drop peaks within `min_distance` of a non-singleton border
///
/// # Returns
/// Peak coordinates as (z, y, x), brightest first.
pub fn peak_local_max(
    volume: &Buffer3<f32>,
    min_distance: usize,
    threshold_abs: f32,
    exclude_border: bool,
) -> Vec<[usize; 3]> {
    let Some(&first) = volume.first() else {
        return Vec::new();
    };
    if volume.iter().all(|&v| v == first) {
        return Vec::new();
    }

    let maxed = (0..3).fold(volume.clone(), |acc, axis| {
        filter_axis(&acc, axis, min_distance, min_distance, |a: f32, b: f32| a > b)
    });

    let shape = volume.shape();
    let near_border = |coords: [usize; 3]| {
        coords.iter().zip(shape).any(|(&pos, extent)| {
            extent > 1 && (pos < min_distance || pos.saturating_add(min_distance) >= extent)
        })
    };

    let mut candidates: Vec<Candidate> = volume
        .iter()
        .zip(maxed.iter())
        .enumerate()
        .filter(|&(_, (&v, &m))| v == m && v > threshold_abs)
        .map(|(idx, (&value, _))| Candidate {
            coords: volume.coords_of(idx),
            value,
        })
        .filter(|c| !(exclude_border && near_border(c.coords)))
        .collect();

    // Stable: equal intensities keep raster order.
    candidates.sort_by(|a, b| b.value.total_cmp(&a.value));

    let peaks = ensure_spacing(&candidates, min_distance);
    tracing::trace!(
        "Found {} peaks from {} candidates (min_distance={})",
        peaks.len(),
        candidates.len(),
        min_distance
    );
    peaks
}

/// Greedy suppression of candidates within `min_distance` of a kept peak.
fn ensure_spacing(sorted: &[Candidate], min_distance: usize) -> Vec<[usize; 3]> {
    let mut kept: Vec<[usize; 3]> = Vec::new();
    for candidate in sorted {
        let too_close = kept.iter().any(|peak| {
            peak.iter()
                .zip(candidate.coords)
                .all(|(&a, b)| a.abs_diff(b) <= min_distance)
        });
        if !too_close {
            kept.push(candidate.coords);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_volume(shape: [usize; 3], centers: &[([usize; 3], f32)]) -> Buffer3<f32> {
        let mut volume = Buffer3::new_filled(shape, 0.0f32);
        let [depth, height, width] = shape;
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    let mut v = 0.0;
                    for &([cz, cy, cx], amp) in centers {
                        let d2 = (z as f32 - cz as f32).powi(2)
                            + (y as f32 - cy as f32).powi(2)
                            + (x as f32 - cx as f32).powi(2);
                        v += amp * (-d2 / 4.0).exp();
                    }
                    volume[(z, y, x)] = v;
                }
            }
        }
        volume
    }

    #[test]
    fn test_constant_volume_has_no_peaks() {
        let volume = Buffer3::new_filled([5, 5, 5], 1.0f32);
        assert!(peak_local_max(&volume, 1, 0.0, false).is_empty());
    }

    #[test]
    fn test_finds_separated_blobs_brightest_first() {
        let volume = blob_volume([12, 30, 30], &[([6, 8, 8], 50.0), ([6, 20, 21], 80.0)]);
        let peaks = peak_local_max(&volume, 3, 5.0, true);
        assert_eq!(peaks, vec![[6, 20, 21], [6, 8, 8]]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let volume = blob_volume([9, 15, 15], &[([4, 7, 7], 10.0)]);
        assert!(peak_local_max(&volume, 2, 10.0, false).is_empty());
        assert_eq!(peak_local_max(&volume, 2, 9.9, false), vec![[4, 7, 7]]);
    }

    #[test]
    fn test_exclude_border_drops_peaks_near_edge() {
        let volume = blob_volume([9, 20, 20], &[([4, 2, 10], 30.0), ([4, 10, 10], 20.0)]);
        assert_eq!(peak_local_max(&volume, 3, 1.0, true), vec![[4, 10, 10]]);
        assert_eq!(
            peak_local_max(&volume, 3, 1.0, false),
            vec![[4, 2, 10], [4, 10, 10]]
        );
    }

    #[test]
    fn test_close_peaks_are_suppressed() {
        // Two equal peaks 2 voxels apart.
        let mut volume = Buffer3::new_filled([1, 9, 9], 0.0f32);
        volume[(0, 4, 3)] = 5.0;
        volume[(0, 4, 5)] = 5.0;
        let peaks = peak_local_max(&volume, 2, 1.0, false);
        assert_eq!(peaks, vec![[0, 4, 3]]);

        let peaks = peak_local_max(&volume, 1, 1.0, false);
        assert_eq!(peaks, vec![[0, 4, 3], [0, 4, 5]]);
    }

    #[test]
    fn test_huge_min_distance_keeps_global_maximum() {
        let volume = blob_volume([5, 12, 12], &[([2, 3, 3], 20.0), ([2, 8, 8], 40.0)]);
        assert_eq!(peak_local_max(&volume, usize::MAX, 1.0, false), vec![[2, 8, 8]]);
        assert!(peak_local_max(&volume, usize::MAX, 1.0, true).is_empty());
    }

    #[test]
    fn test_planar_volume_ignores_depth_border() {
        let volume = blob_volume([1, 15, 15], &[([0, 7, 7], 10.0)]);
        assert_eq!(peak_local_max(&volume, 3, 1.0, true), vec![[0, 7, 7]]);
    }
}
