//! Per-channel spot segmentation.
//!
//! One channel volume becomes a label volume in six steps:
//!
//! 1. Otsu threshold `T` of the raw channel
//! 2. Gaussian smoothing with per-axis sigma (range preserved)
//! 3. Hysteresis at `T * low` / `T * high`, optionally seeded by local maxima
//! 4. Closing with a cube of side `min_distance`
//! 5. Removal of objects touching the border
//! 6. Fully connected labeling, labels `1..=n` in raster order


pub mod gaussian;
pub mod labeling;
pub mod local_maxima;
pub mod morphology;
pub mod threshold;

use common::buffer3::Buffer3;

pub use crate::config::{SegmentationConfig, SegmentationMethod};
pub use gaussian::gaussian_filter;
pub use labeling::{Connectivity, LabelMap, label};
pub use local_maxima::peak_local_max;
pub use morphology::{binary_closing, clear_border};
pub use threshold::{hysteresis_threshold, otsu_threshold};

/// Absolute peak floor for [`SegmentationMethod::LocalMax`], as a fraction of `T`.
pub const PEAK_THRESHOLD_FACTOR: f32 = 0.5;

/// Segment one channel into a label volume.
///
/// The config is not validated here; pipelines validate it once up front.
/// Background is 0 and no labeled object touches a non-singleton border.
pub fn segment_channel(channel: &Buffer3<f32>, config: &SegmentationConfig) -> Buffer3<u32> {
    let threshold = otsu_threshold(channel.voxels());
    let smoothed = gaussian_filter(channel, config.sigma);

    let (low_level, high_level) = config.hysteresis_levels;
    let low = threshold * low_level;
    let high = threshold * high_level;

    let foreground = match config.method {
        SegmentationMethod::Hysteresis => hysteresis_threshold(&smoothed, low, high),
        SegmentationMethod::LocalMax => {
            let peaks = peak_local_max(
                &smoothed,
                config.min_distance,
                threshold * PEAK_THRESHOLD_FACTOR,
                true,
            );
            let seeded = seed_peaks(smoothed, &peaks);
            tracing::debug!("Seeded {} local maxima", peaks.len());
            hysteresis_threshold(&seeded, low, high)
        }
    };

    let closed = binary_closing(&foreground, config.min_distance);
    let cleared = clear_border(&closed);
    let labels = label(&cleared, Connectivity::Full);

    tracing::debug!(
        "Segmented channel {:?}: threshold={:.3}, method={}, foreground={}, objects={}",
        channel.shape(),
        threshold,
        config.method,
        cleared.count_set(),
        labels.num_labels()
    );

    labels.into_labels()
}

/// Raise every peak voxel to the volume maximum so it passes the high level.
fn seed_peaks(mut volume: Buffer3<f32>, peaks: &[[usize; 3]]) -> Buffer3<f32> {
    let max = volume.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    for &[z, y, x] in peaks {
        volume[(z, y, x)] = max;
    }
    volume
}
