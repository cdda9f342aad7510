//! Global (Otsu) and two-level (hysteresis) thresholding.

use common::buffer3::Buffer3;

use super::labeling::{Connectivity, label};

/// Number of histogram bins used by [`otsu_threshold`].
pub const OTSU_BINS: usize = 256;

/// Compute a global threshold with Otsu's method.
///
/// Builds a 256-bin histogram over `[min, max]` and returns the center of the
/// bin that maximizes the between-class variance. A constant input returns
/// its single value. Non-finite samples are ignored.
///
/// # Arguments
/// * `values` - Intensity samples, in any order
///
/// # Returns
/// The threshold, or 0.0 for an input without finite samples.
pub fn otsu_threshold(values: &[f32]) -> f32 {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        return 0.0;
    }
    if min == max {
        return min;
    }

    let min = min as f64;
    let bin_width = (max as f64 - min) / OTSU_BINS as f64;
    let mut counts = [0u64; OTSU_BINS];
    for &v in values.iter().filter(|v| v.is_finite()) {
        // The last bin is closed on the right.
        let bin = (((v as f64 - min) / bin_width) as usize).min(OTSU_BINS - 1);
        counts[bin] += 1;
    }

    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min + (i as f64 + 0.5) * bin_width)
        .collect();

    // Class weights and means for "at or below bin i" and "above bin i".
    let mut weight_below = [0.0f64; OTSU_BINS];
    let mut mean_below = [0.0f64; OTSU_BINS];
    let mut weight = 0.0;
    let mut moment = 0.0;
    for i in 0..OTSU_BINS {
        weight += counts[i] as f64;
        moment += counts[i] as f64 * centers[i];
        weight_below[i] = weight;
        mean_below[i] = if weight > 0.0 { moment / weight } else { 0.0 };
    }

    let mut weight_above = [0.0f64; OTSU_BINS];
    let mut mean_above = [0.0f64; OTSU_BINS];
    let mut weight = 0.0;
    let mut moment = 0.0;
    for i in (0..OTSU_BINS).rev() {
        weight += counts[i] as f64;
        moment += counts[i] as f64 * centers[i];
        weight_above[i] = weight;
        mean_above[i] = if weight > 0.0 { moment / weight } else { 0.0 };
    }

    let mut best_idx = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let diff = mean_below[i] - mean_above[i + 1];
        let variance = weight_below[i] * weight_above[i + 1] * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best_idx = i;
        }
    }

    centers[best_idx] as f32
}

/// Two-level threshold with connectivity.
///
/// A voxel is foreground when it is above `low` and belongs to a
/// face-connected region of above-`low` voxels that contains at least one
/// voxel above `high`. Both comparisons are strict.
pub fn hysteresis_threshold(volume: &Buffer3<f32>, low: f32, high: f32) -> Buffer3<bool> {
    let low_mask = volume.map(|&v| v > low);
    let regions = label(&low_mask, Connectivity::Face);
    if regions.num_labels() == 0 {
        return low_mask;
    }

    let mut connected_to_high = vec![false; regions.num_labels() + 1];
    for (&v, &l) in volume.iter().zip(regions.labels().iter()) {
        if l != 0 && v > high {
            connected_to_high[l as usize] = true;
        }
    }

    let mask = regions.labels().map(|&l| connected_to_high[l as usize]);
    tracing::trace!(
        "Hysteresis kept {} of {} above-low voxels",
        mask.count_set(),
        low_mask.count_set()
    );
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otsu_constant_returns_value() {
        assert_eq!(otsu_threshold(&[3.5; 16]), 3.5);
    }

    #[test]
    fn test_otsu_empty_returns_zero() {
        assert_eq!(otsu_threshold(&[]), 0.0);
        assert_eq!(otsu_threshold(&[f32::NAN, f32::NAN]), 0.0);
    }

    #[test]
    fn test_otsu_splits_bimodal_data() {
        let mut values = vec![10.0f32; 500];
        values.extend(std::iter::repeat_n(100.0f32, 100));
        let t = otsu_threshold(&values);
        assert!(t > 10.0 && t < 100.0, "threshold {t} not between the modes");
        // Two-valued data: the first bin maximizes the variance, center at min + width / 2.
        let expected = 10.0 + 0.5 * (90.0 / 256.0);
        assert!((t - expected).abs() < 1e-4, "got {t}, expected {expected}");
    }

    #[test]
    fn test_otsu_separates_noisy_modes() {
        let mut values = Vec::new();
        for i in 0..200 {
            values.push(20.0 + (i % 7) as f32);
            values.push(200.0 + (i % 11) as f32);
        }
        let t = otsu_threshold(&values);
        assert!(t > 26.0 && t < 200.0, "threshold {t}");
    }

    #[test]
    fn test_hysteresis_keeps_regions_connected_to_high() {
        // Row: weak region joined to a strong voxel, then an isolated weak region.
        let volume = Buffer3::new([1, 1, 7], vec![0.6, 0.7, 1.0, 0.0, 0.6, 0.7, 0.0]);
        let mask = hysteresis_threshold(&volume, 0.5, 0.9);
        assert_eq!(
            mask.voxels(),
            &[true, true, true, false, false, false, false]
        );
    }

    #[test]
    fn test_hysteresis_thresholds_are_strict() {
        let volume = Buffer3::new([1, 1, 3], vec![0.5, 0.9, 0.5]);
        let mask = hysteresis_threshold(&volume, 0.5, 0.9);
        assert_eq!(mask.count_set(), 0);
    }

    #[test]
    fn test_hysteresis_uses_face_connectivity() {
        // Diagonal weak voxel does not join the strong one.
        let volume = Buffer3::new([1, 2, 2], vec![1.0, 0.0, 0.0, 0.6]);
        let mask = hysteresis_threshold(&volume, 0.5, 0.9);
        assert_eq!(mask.voxels(), &[true, false, false, false]);
    }
}
