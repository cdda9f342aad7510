//! Separable Gaussian smoothing of 3D volumes.
//!
//! Each axis is convolved with its own 1D kernel, truncated at 4 sigma.
//! Samples outside the volume take the value of the nearest edge sample.
//! The output keeps the input's intensity range (no renormalization).

use common::buffer3::Buffer3;
use rayon::prelude::*;

/// Kernel half-width in units of sigma.
pub const TRUNCATE: f32 = 4.0;

/// Compute a normalized 1D Gaussian kernel of radius `round(4 * sigma)`.
///
/// # Arguments
/// * `sigma` - Standard deviation in voxels, must be positive
///
/// # Returns
/// Kernel of length `2 * radius + 1` summing to 1.0.
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f64> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let sigma = sigma as f64;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Smooth `volume` with per-axis standard deviations `sigma` = (z, y, x).
///
/// A zero sigma leaves that axis untouched. Lines along each axis are
/// processed in parallel.
pub fn gaussian_filter(volume: &Buffer3<f32>, sigma: [f32; 3]) -> Buffer3<f32> {
    let shape = volume.shape();
    let mut data = volume.voxels().to_vec();
    if data.is_empty() {
        return Buffer3::new(shape, data);
    }

    for (axis, &s) in sigma.iter().enumerate() {
        if s <= 0.0 || shape[axis] == 1 {
            continue;
        }
        let kernel = gaussian_kernel_1d(s);
        data = convolve_axis(&data, shape, axis, &kernel);
    }

    Buffer3::new(shape, data)
}

fn convolve_axis(input: &[f32], shape: [usize; 3], axis: usize, kernel: &[f64]) -> Vec<f32> {
    let [_, height, width] = shape;
    let plane = height * width;
    let mut output = vec![0.0f32; input.len()];

    match axis {
        2 => {
            output
                .par_chunks_mut(width)
                .zip(input.par_chunks(width))
                .for_each(|(out_row, in_row)| convolve_line(in_row, out_row, kernel));
        }
        1 => {
            output
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(row_idx, out_row)| {
                    let z = row_idx / height;
                    let y = row_idx % height;
                    let slab = &input[z * plane..(z + 1) * plane];
                    accumulate_lines(out_row, kernel, y, height, |yy| {
                        &slab[yy * width..(yy + 1) * width]
                    });
                });
        }
        0 => {
            let depth = shape[0];
            output
                .par_chunks_mut(plane)
                .enumerate()
                .for_each(|(z, out_plane)| {
                    accumulate_lines(out_plane, kernel, z, depth, |zz| {
                        &input[zz * plane..(zz + 1) * plane]
                    });
                });
        }
        _ => unreachable!("volume has three axes"),
    }

    output
}

/// Convolve one contiguous line with nearest-edge boundary handling.
#[inline]
fn convolve_line(input: &[f32], output: &mut [f32], kernel: &[f64]) {
    let radius = kernel.len() / 2;
    let last = input.len() - 1;
    for (i, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0f64;
        for (k, &w) in kernel.iter().enumerate() {
            let src = (i + k).saturating_sub(radius).min(last);
            sum += w * input[src] as f64;
        }
        *out = sum as f32;
    }
}

/// Write into `output` the kernel-weighted sum of whole lines around
/// position `pos` of an axis with `extent` entries.
#[inline]
fn accumulate_lines<'a, F>(output: &mut [f32], kernel: &[f64], pos: usize, extent: usize, line: F)
where
    F: Fn(usize) -> &'a [f32],
{
    let radius = kernel.len() / 2;
    let mut acc = vec![0.0f64; output.len()];
    for (k, &w) in kernel.iter().enumerate() {
        let src = (pos + k).saturating_sub(radius).min(extent - 1);
        for (a, &v) in acc.iter_mut().zip(line(src)) {
            *a += w * v as f64;
        }
    }
    for (out, a) in output.iter_mut().zip(acc) {
        *out = a as f32;
    }
}
