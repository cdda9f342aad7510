//! Per-region photometric and spatial properties of segmented spots.

#[cfg(test)]
mod tests;

pub mod artifact;

use std::collections::BTreeMap;

use common::buffer3::Buffer3;
use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::validate_pixel_size;
use crate::error::{Error, Result};

pub use artifact::{ArtifactFilter, CenterCrossFilter, KeepAllRegions};

/// Measurements of one labeled region.
///
/// Coordinates are in voxels and packed as (z, y, x) into the `x`, `y` and
/// `z` lanes of a [`DVec3`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotProperty {
    pub label: u32,
    /// Voxel count.
    pub area: usize,
    /// Unweighted mean voxel position.
    pub centroid: DVec3,
    /// Intensity-weighted mean voxel position.
    pub weighted_centroid: DVec3,
    pub max_intensity: f64,
    pub mean_intensity: f64,
    pub min_intensity: f64,
}

/// Filtered regions of one channel and their spot positions.
///
/// `positions[i]` is the (optionally scaled) weighted centroid of
/// `properties[i]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelSpots {
    pub properties: Vec<SpotProperty>,
    pub positions: Vec<DVec3>,
}

impl ChannelSpots {
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

// ============================================================================
// Accumulation
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct RegionAccumulator {
    area: usize,
    coord_sum: DVec3,
    weighted_sum: DVec3,
    intensity_sum: f64,
    min: f64,
    max: f64,
}

impl Default for RegionAccumulator {
    fn default() -> Self {
        Self {
            area: 0,
            coord_sum: DVec3::ZERO,
            weighted_sum: DVec3::ZERO,
            intensity_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl RegionAccumulator {
    #[inline]
    fn add(&mut self, coords: [usize; 3], value: f64) {
        let c = DVec3::from_array(coords.map(|c| c as f64));
        self.area += 1;
        self.coord_sum += c;
        self.weighted_sum += c * value;
        self.intensity_sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn merge(&mut self, other: &RegionAccumulator) {
        self.area += other.area;
        self.coord_sum += other.coord_sum;
        self.weighted_sum += other.weighted_sum;
        self.intensity_sum += other.intensity_sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn finish(&self, label: u32) -> SpotProperty {
        let area = self.area as f64;
        let centroid = self.coord_sum / area;
        // A zero-mass region has no intensity weighting.
        let weighted_centroid = if self.intensity_sum != 0.0 {
            self.weighted_sum / self.intensity_sum
        } else {
            centroid
        };
        SpotProperty {
            label,
            area: self.area,
            centroid,
            weighted_centroid,
            max_intensity: self.max,
            mean_intensity: self.intensity_sum / area,
            min_intensity: self.min,
        }
    }
}

/// Measure every positive label of `labels` against `channel`.
///
/// Returns one [`SpotProperty`] per distinct label, in ascending label order.
///
/// # Errors
/// [`Error::ShapeMismatch`] when the volumes differ in shape.
pub fn region_properties(channel: &Buffer3<f32>, labels: &Buffer3<u32>) -> Result<Vec<SpotProperty>> {
    if channel.shape() != labels.shape() {
        return Err(Error::shape_mismatch(
            "intensity and label volumes",
            channel.shape(),
            labels.shape(),
        ));
    }
    if channel.is_empty() {
        return Ok(Vec::new());
    }

    let plane_len = channel.plane_len();
    // Per-plane partial sums, merged in plane order for reproducible floats.
    let partials: Vec<BTreeMap<u32, RegionAccumulator>> = labels
        .par_chunks(plane_len)
        .zip(channel.par_chunks(plane_len))
        .enumerate()
        .map(|(z, (label_plane, value_plane))| {
            let mut regions: BTreeMap<u32, RegionAccumulator> = BTreeMap::new();
            for (offset, (&l, &v)) in label_plane.iter().zip(value_plane).enumerate() {
                if l == 0 {
                    continue;
                }
                let y = offset / channel.width();
                let x = offset % channel.width();
                regions.entry(l).or_default().add([z, y, x], v as f64);
            }
            regions
        })
        .collect();

    let mut regions: BTreeMap<u32, RegionAccumulator> = BTreeMap::new();
    for partial in &partials {
        for (&l, acc) in partial {
            regions.entry(l).or_default().merge(acc);
        }
    }

    Ok(regions.iter().map(|(&l, acc)| acc.finish(l)).collect())
}

// ============================================================================
// Extraction
// ============================================================================

/// Measure the regions of one channel, drop artifacts and derive spot positions.
///
/// # Arguments
/// * `channel` - Intensity volume
/// * `labels` - Label volume of the same shape
/// * `filter` - Artifact policy; selected regions are removed, order is kept
/// * `pixel_size` - Optional (z, y, x) scale applied to positions
pub fn extract_channel_spots(
    channel: &Buffer3<f32>,
    labels: &Buffer3<u32>,
    filter: &dyn ArtifactFilter,
    pixel_size: Option<DVec3>,
) -> Result<ChannelSpots> {
    validate_pixel_size("pixel_size", pixel_size)?;
    let mut properties = region_properties(channel, labels)?;
    let measured = properties.len();

    let mut discard = filter.artifacts(&properties);
    discard.sort_unstable();
    discard.dedup();
    for &idx in discard.iter().rev() {
        if idx < properties.len() {
            properties.remove(idx);
        } else {
            tracing::warn!(
                "Artifact filter {} selected region {} of {}, ignoring",
                filter.name(),
                idx,
                measured
            );
        }
    }

    let scale = pixel_size.unwrap_or(DVec3::ONE);
    let positions = properties
        .iter()
        .map(|p| p.weighted_centroid * scale)
        .collect();

    tracing::debug!(
        "Extracted {} spots from {} regions (filter={})",
        properties.len(),
        measured,
        filter.name()
    );

    Ok(ChannelSpots {
        properties,
        positions,
    })
}
