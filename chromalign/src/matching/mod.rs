//! Cross-channel nearest-neighbor matching of spot positions.
//!
//! For every ordered channel pair (A, B), each spot of A is paired with its
//! nearest spot of B under a per-axis weighted Euclidean distance
//! `sqrt(sum(w * (a - b)^2))`. Pairs at or beyond the cutoff are dropped.
//!
//! The query is one-sided: several spots of A may share the same nearest spot
//! of B, and (A, B) and (B, A) can differ in size. [`mutual_matches`] keeps
//! only pairs that are nearest in both directions.


use std::collections::HashMap;

use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::validate_pixel_size;
use crate::error::{Error, Result};

/// Nearest-neighbor matches from channel A to channel B.
///
/// All vectors are parallel, one entry per retained spot of A, in A's order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PairwiseDistanceRecord {
    /// (A, B) channel indices.
    pub channels: (usize, usize),
    /// Position of the matched spot of A.
    pub coord_of_a: Vec<DVec3>,
    /// Weighted distance to the nearest spot of B.
    pub dist_3d: Vec<f64>,
    /// Index of the matched spot in A's position list.
    pub index_of_a: Vec<usize>,
    /// Index of the nearest spot in B's position list.
    pub index_of_b: Vec<usize>,
}

/// Distance statistics of one [`PairwiseDistanceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
}

impl PairwiseDistanceRecord {
    fn new(channels: (usize, usize)) -> Self {
        Self {
            channels,
            ..Default::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dist_3d.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dist_3d.is_empty()
    }

    /// Count, mean, median and maximum of the match distances.
    ///
    /// `None` for a record without matches.
    pub fn summary(&self) -> Option<DistanceSummary> {
        if self.is_empty() {
            return None;
        }
        let mut sorted = self.dist_3d.clone();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Some(DistanceSummary {
            count,
            mean: sorted.iter().sum::<f64>() / count as f64,
            median,
            max: sorted[count - 1],
        })
    }

    /// Mean per-axis displacement from A to its matched spot in B.
    ///
    /// `positions_b` must be the list B was matched against. This is the
    /// chromatic shift of channel B relative to A. `None` for an empty record
    /// or when `positions_b` is too short for the recorded indices.
    pub fn mean_offset(&self, positions_b: &[DVec3]) -> Option<DVec3> {
        if self.is_empty() {
            return None;
        }
        let mut sum = DVec3::ZERO;
        for (&a, &ib) in self.coord_of_a.iter().zip(&self.index_of_b) {
            sum += *positions_b.get(ib)? - a;
        }
        Some(sum / self.len() as f64)
    }
}

/// Weighted Euclidean distance `sqrt(sum(w * (a - b)^2))`.
#[inline]
pub fn weighted_distance(a: DVec3, b: DVec3, weights: DVec3) -> f64 {
    let d = a - b;
    (d * d).dot(weights).sqrt()
}

/// Nearest entry of `candidates` to `point`: (distance, index), first on ties.
fn nearest(point: DVec3, candidates: &[DVec3], weights: DVec3) -> Option<(f64, usize)> {
    let mut best: Option<(f64, usize)> = None;
    for (idx, &candidate) in candidates.iter().enumerate() {
        let d = weighted_distance(point, candidate, weights);
        if best.is_none_or(|(best_d, _)| d < best_d) {
            best = Some((d, idx));
        }
    }
    best
}

/// Match every spot of `a` to its nearest spot of `b` within `sigma`.
fn match_pair(
    channels: (usize, usize),
    a: &[DVec3],
    b: &[DVec3],
    sigma: f64,
    weights: DVec3,
) -> PairwiseDistanceRecord {
    let nearest_in_b: Vec<Option<(f64, usize)>> =
        a.par_iter().map(|&p| nearest(p, b, weights)).collect();

    let mut record = PairwiseDistanceRecord::new(channels);
    for (ia, (&p, hit)) in a.iter().zip(nearest_in_b).enumerate() {
        if let Some((d, ib)) = hit
            && d < sigma
        {
            record.coord_of_a.push(p);
            record.dist_3d.push(d);
            record.index_of_a.push(ia);
            record.index_of_b.push(ib);
        }
    }
    record
}

/// Nearest-neighbor distances between every ordered pair of channels.
///
/// # Arguments
/// * `positions` - Spot positions per channel
/// * `sigma` - Matches with a distance at or above this are dropped, so a
///   non-positive or NaN cutoff yields empty records
/// * `pixel_size` - Per-axis distance weights; unit weights when `None`
///
/// # Returns
/// One record per ordered pair (A, B), A != B, in lexicographic order:
/// (0, 1), (0, 2), ..., (1, 0), (1, 2), ... A channel without spots yields
/// empty records.
///
/// # Errors
/// [`Error::InsufficientChannels`] for fewer than two channels,
/// [`Error::InvalidConfig`] for a non-positive or non-finite `pixel_size`.
pub fn compute_distances_matrix(
    positions: &[Vec<DVec3>],
    sigma: f64,
    pixel_size: Option<DVec3>,
) -> Result<Vec<PairwiseDistanceRecord>> {
    if positions.len() < 2 {
        return Err(Error::InsufficientChannels {
            found: positions.len(),
        });
    }
    validate_pixel_size("match pixel size", pixel_size)?;

    let weights = match pixel_size {
        Some(size) => size,
        None => {
            tracing::warn!("No pixel size given, matching distances are in voxel units");
            DVec3::ONE
        }
    };

    let n = positions.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|a| (0..n).filter(move |&b| b != a).map(move |b| (a, b)))
        .collect();

    let records: Vec<PairwiseDistanceRecord> = pairs
        .par_iter()
        .map(|&(a, b)| match_pair((a, b), &positions[a], &positions[b], sigma, weights))
        .collect();

    for record in &records {
        tracing::debug!(
            "Channels {:?}: {} of {} spots matched",
            record.channels,
            record.len(),
            positions[record.channels.0].len()
        );
    }

    Ok(records)
}

// ============================================================================
// Mutual matches
// ============================================================================

/// A pair of spots that are each other's nearest neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutualMatch {
    /// (A, B) with A < B.
    pub channels: (usize, usize),
    pub index_of_a: usize,
    pub index_of_b: usize,
    /// Distance from the (A, B) record.
    pub distance: f64,
}

/// Keep only matches that agree in both directions.
///
/// For each channel pair A < B with both (A, B) and (B, A) present, a match
/// `i -> j` of (A, B) is kept when (B, A) matches `j -> i`. Output follows the
/// order of `records`, then A's spot order.
pub fn mutual_matches(records: &[PairwiseDistanceRecord]) -> Vec<MutualMatch> {
    let by_channels: HashMap<(usize, usize), &PairwiseDistanceRecord> =
        records.iter().map(|r| (r.channels, r)).collect();

    let mut mutual = Vec::new();
    for record in records {
        let (a, b) = record.channels;
        if a >= b {
            continue;
        }
        let Some(reverse) = by_channels.get(&(b, a)) else {
            continue;
        };
        let back: HashMap<usize, usize> = reverse
            .index_of_a
            .iter()
            .copied()
            .zip(reverse.index_of_b.iter().copied())
            .collect();

        for i in 0..record.len() {
            let (ia, ib) = (record.index_of_a[i], record.index_of_b[i]);
            if back.get(&ib) == Some(&ia) {
                mutual.push(MutualMatch {
                    channels: (a, b),
                    index_of_a: ia,
                    index_of_b: ib,
                    distance: record.dist_3d[i],
                });
            }
        }
    }
    mutual
}
