//! Testing utilities for chromalign.
//!
//! Synthetic spot volumes with known centers, used to check segmentation,
//! property extraction and cross-channel matching end to end.

#![allow(dead_code)]

use common::buffer3::{Buffer3, Shape3};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::volume::MultiChannelVolume;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One anisotropic Gaussian spot.
#[derive(Debug, Clone, Copy)]
pub struct Spot {
    /// Center (z, y, x), may be sub-voxel.
    pub center: DVec3,
    /// Gaussian sigma per axis (z, y, x).
    pub sigma: DVec3,
    pub amplitude: f32,
}

/// Render `spots` on a constant background.
///
/// # Arguments
/// * `shape` - Volume shape (z, y, x)
/// * `spots` - Gaussian spots added to the background
/// * `background` - Constant background level
pub fn render_spots(shape: Shape3, spots: &[Spot], background: f32) -> Buffer3<f32> {
    let mut volume = Buffer3::new_filled(shape, background);
    let [depth, height, width] = shape;

    for spot in spots {
        // Only evaluate within 5 sigma of the center.
        let range = |axis: usize, extent: usize| {
            let reach = 5.0 * spot.sigma[axis];
            let lo = (spot.center[axis] - reach).floor().max(0.0) as usize;
            let hi = ((spot.center[axis] + reach).ceil().max(0.0) as usize).min(extent - 1);
            lo..=hi
        };
        for z in range(0, depth) {
            for y in range(1, height) {
                for x in range(2, width) {
                    let diff = DVec3::new(z as f64, y as f64, x as f64) - spot.center;
                    let r2 = (diff * diff / (2.0 * spot.sigma * spot.sigma)).element_sum();
                    volume[(z, y, x)] += spot.amplitude * (-r2).exp() as f32;
                }
            }
        }
    }

    volume
}

/// Add uniform noise in `[-amplitude, amplitude]` with a fixed seed.
pub fn add_uniform_noise(volume: &mut Buffer3<f32>, amplitude: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in volume.iter_mut() {
        *v += rng.random_range(-amplitude..=amplitude);
    }
}

/// Spot centers on a regular grid, `margin` voxels away from the y/x border.
pub fn grid_centers(shape: Shape3, spacing: usize, margin: usize) -> Vec<DVec3> {
    let [depth, height, width] = shape;
    let zc = (depth / 2) as f64;
    let mut centers = Vec::new();
    let mut y = margin;
    while y + margin < height {
        let mut x = margin;
        while x + margin < width {
            centers.push(DVec3::new(zc, y as f64, x as f64));
            x += spacing;
        }
        y += spacing;
    }
    centers
}

/// Stack channels into a (C, Z, Y, X) volume.
pub fn stack_channels(channels: &[Buffer3<f32>]) -> MultiChannelVolume<f32> {
    MultiChannelVolume::from_channels(channels).unwrap()
}
