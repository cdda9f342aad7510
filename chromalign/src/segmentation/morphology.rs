//! Separable extreme filters and binary morphology on 3D volumes.
//!
//! A cubic structuring element is separable, so dilation and erosion run as
//! three 1D sliding-window passes. Each pass is O(n) per line using a
//! monotonic deque. Windows are clipped at the volume edge.

use std::collections::VecDeque;

use common::buffer3::Buffer3;
use rayon::prelude::*;

use super::labeling::{Connectivity, label};

/// Sliding-window extreme of `line` over `[i - before, i + after]`, clipped.
///
/// Window bounds saturate, so an extent beyond the line covers all of it.
///
/// `better(a, b)` returns true when `a` strictly beats `b`; `|a, b| a > b`
/// yields a running maximum.
pub(crate) fn sliding_extreme<T, F>(line: &[T], before: usize, after: usize, better: F) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> bool,
{
    let n = line.len();
    let mut out = Vec::with_capacity(n);
    let mut window: VecDeque<usize> =
        VecDeque::with_capacity(before.saturating_add(after).saturating_add(1).min(n));
    let mut next = 0;

    for i in 0..n {
        let hi = i.saturating_add(after).min(n - 1);
        while next <= hi {
            while let Some(&back) = window.back() {
                if better(line[back], line[next]) {
                    break;
                }
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }

        let lo = i.saturating_sub(before);
        while let Some(&front) = window.front() {
            if front >= lo {
                break;
            }
            window.pop_front();
        }

        out.push(line[window[0]]);
    }

    out
}

/// Apply [`sliding_extreme`] along one axis of `volume`.
pub(crate) fn filter_axis<T, F>(
    volume: &Buffer3<T>,
    axis: usize,
    before: usize,
    after: usize,
    better: F,
) -> Buffer3<T>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> bool + Sync,
{
    let shape = volume.shape();
    let strides = volume.strides();
    let len = shape[axis];
    if len <= 1 || (before == 0 && after == 0) {
        return volume.clone();
    }

    let (outer, inner) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let stride = strides[axis];
    let starts: Vec<usize> = (0..shape[outer])
        .flat_map(|i| (0..shape[inner]).map(move |j| i * strides[outer] + j * strides[inner]))
        .collect();

    let voxels = volume.voxels();
    let lines: Vec<Vec<T>> = starts
        .par_iter()
        .map(|&start| {
            let line: Vec<T> = (0..len).map(|k| voxels[start + k * stride]).collect();
            sliding_extreme(&line, before, after, &better)
        })
        .collect();

    let mut out = volume.clone();
    let out_voxels = out.voxels_mut();
    for (&start, line) in starts.iter().zip(lines) {
        for (k, v) in line.into_iter().enumerate() {
            out_voxels[start + k * stride] = v;
        }
    }
    out
}

/// Split a window of `side` samples into (before, after) around its origin.
///
/// Even sides put the extra sample after the origin.
#[inline]
fn window_extent(side: usize) -> (usize, usize) {
    let after = side / 2;
    (side - 1 - after, after)
}

/// Binary dilation with a cube of `side` voxels.
pub fn binary_dilation(mask: &Buffer3<bool>, side: usize) -> Buffer3<bool> {
    let (before, after) = window_extent(side.max(1));
    (0..3).fold(mask.clone(), |acc, axis| {
        filter_axis(&acc, axis, before, after, |a: bool, b: bool| a & !b)
    })
}

/// Binary erosion with a cube of `side` voxels (mirror of [`binary_dilation`]).
pub fn binary_erosion(mask: &Buffer3<bool>, side: usize) -> Buffer3<bool> {
    let (before, after) = window_extent(side.max(1));
    (0..3).fold(mask.clone(), |acc, axis| {
        filter_axis(&acc, axis, after, before, |a: bool, b: bool| !a & b)
    })
}

/// Morphological closing (dilation, then erosion) with a cube of `side` voxels.
///
/// Fills gaps narrower than the cube so nearby fragments merge into one
/// object. A side of 0 or 1 returns the mask unchanged.
pub fn binary_closing(mask: &Buffer3<bool>, side: usize) -> Buffer3<bool> {
    if side <= 1 {
        return mask.clone();
    }
    binary_erosion(&binary_dilation(mask, side), side)
}

/// Remove every fully connected foreground object that touches the border.
///
/// Axes of extent 1 are not spatial and never count as border.
pub fn clear_border(mask: &Buffer3<bool>) -> Buffer3<bool> {
    let regions = label(mask, Connectivity::Full);
    if regions.num_labels() == 0 {
        return mask.clone();
    }

    let labels = regions.labels();
    let mut touches_border = vec![false; regions.num_labels() + 1];
    let [depth, height, width] = labels.shape();
    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let l = labels[(z, y, x)];
                if l != 0 && labels.is_border(z, y, x) {
                    touches_border[l as usize] = true;
                }
            }
        }
    }

    let cleared = labels.map(|&l| l != 0 && !touches_border[l as usize]);
    tracing::trace!(
        "Cleared {} border objects",
        touches_border.iter().filter(|&&t| t).count()
    );
    cleared
}
