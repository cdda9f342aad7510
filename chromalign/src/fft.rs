//! Frequency-domain views of spot images.
//!
//! Real-input FFT magnitudes per channel, computed as separable complex FFTs
//! with `rustfft`. Only the non-negative frequencies of the X axis are kept,
//! so a channel of width `X` yields `X / 2 + 1` columns.

use std::sync::Arc;

use common::buffer3::Buffer3;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::error::{Error, Result};
use crate::volume::MultiChannelVolume;

/// Default number of radial bins of [`radial_mean`].
pub const RADIAL_MEAN_BINS: usize = 200;

/// Per-channel 2D FFT magnitude of a planar image.
///
/// Output shape is `(C, 1, Y, X / 2 + 1)`, with the zero frequency of the
/// half-spectrum axis shifted to its center.
///
/// # Errors
/// [`Error::ShapeMismatch`] when the image has more than one z-plane.
pub fn fft_2d(image: &MultiChannelVolume<f32>) -> Result<MultiChannelVolume<f64>> {
    let [channels, depth, height, width] = image.shape();
    if depth != 1 {
        return Err(Error::shape_mismatch(
            "planar image",
            [channels, 1, height, width],
            image.shape(),
        ));
    }
    transform_channels(image, false)
}

/// Per-channel 3D FFT magnitude.
///
/// Output shape is `(C, Z, Y, X / 2 + 1)`, with the zero frequency of the
/// Y axis shifted to its center.
pub fn fft_3d(image: &MultiChannelVolume<f32>) -> Result<MultiChannelVolume<f64>> {
    transform_channels(image, true)
}

fn transform_channels(
    image: &MultiChannelVolume<f32>,
    transform_z: bool,
) -> Result<MultiChannelVolume<f64>> {
    let [channels, depth, height, width] = image.shape();
    let half = if width == 0 { 0 } else { width / 2 + 1 };
    let out_shape = [channels, depth, height, half];
    if image.channel_len() == 0 {
        return Ok(MultiChannelVolume::zeros(out_shape));
    }

    let mut planner = FftPlanner::new();
    let plans = FftPlans {
        x: planner.plan_fft_forward(width),
        y: planner.plan_fft_forward(height),
        z: planner.plan_fft_forward(depth),
    };

    let mut data = Vec::with_capacity(channels * depth * height * half);
    for c in 0..channels {
        let spectrum = channel_spectrum(
            image.channel_slice(c),
            [depth, height, width],
            &plans,
            transform_z,
        );
        let shift_axis = if transform_z { 1 } else { 2 };
        data.extend(fftshift_axis(&spectrum, [depth, height, half], shift_axis));
    }

    tracing::debug!(
        "Computed {} FFT magnitude {:?} -> {:?}",
        if transform_z { "3D" } else { "2D" },
        image.shape(),
        out_shape
    );
    MultiChannelVolume::from_vec(out_shape, data)
}

struct FftPlans {
    x: Arc<dyn Fft<f64>>,
    y: Arc<dyn Fft<f64>>,
    z: Arc<dyn Fft<f64>>,
}

/// Magnitude of the real FFT of one (Z, Y, X) channel, shape (Z, Y, X/2+1).
fn channel_spectrum(
    channel: &[f32],
    [depth, height, width]: [usize; 3],
    plans: &FftPlans,
    transform_z: bool,
) -> Vec<f64> {
    let half = if width == 0 { 0 } else { width / 2 + 1 };
    let mut spectrum = vec![Complex::new(0.0f64, 0.0); depth * height * half];
    if spectrum.is_empty() {
        return Vec::new();
    }

    // Rows: real input, keep non-negative frequencies.
    spectrum
        .par_chunks_mut(half)
        .zip(channel.par_chunks(width))
        .for_each(|(out_row, in_row)| {
            let mut row: Vec<Complex<f64>> =
                in_row.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
            plans.x.process(&mut row);
            out_row.copy_from_slice(&row[..half]);
        });

    // Columns within each z-plane.
    let plane = height * half;
    spectrum.par_chunks_mut(plane).for_each(|plane_data| {
        let mut column = vec![Complex::new(0.0, 0.0); height];
        for kx in 0..half {
            for (y, v) in column.iter_mut().enumerate() {
                *v = plane_data[y * half + kx];
            }
            plans.y.process(&mut column);
            for (y, v) in column.iter().enumerate() {
                plane_data[y * half + kx] = *v;
            }
        }
    });

    if transform_z && depth > 1 {
        let lines: Vec<Vec<Complex<f64>>> = (0..plane)
            .into_par_iter()
            .map(|offset| {
                let mut line: Vec<Complex<f64>> =
                    (0..depth).map(|z| spectrum[z * plane + offset]).collect();
                plans.z.process(&mut line);
                line
            })
            .collect();
        for (offset, line) in lines.into_iter().enumerate() {
            for (z, v) in line.into_iter().enumerate() {
                spectrum[z * plane + offset] = v;
            }
        }
    }

    spectrum.iter().map(|c| c.norm()).collect()
}

/// Roll `data` along `axis` by `len / 2`, moving the zero frequency to the center.
fn fftshift_axis(data: &[f64], shape: [usize; 3], axis: usize) -> Vec<f64> {
    let len = shape[axis];
    if len == 0 {
        return data.to_vec();
    }
    let shift = len / 2;
    let [_, height, width] = shape;
    let mut out = vec![0.0; data.len()];
    for (idx, &v) in data.iter().enumerate() {
        let mut coords = [idx / (height * width), (idx / width) % height, idx % width];
        coords[axis] = (coords[axis] + shift) % len;
        out[(coords[0] * height + coords[1]) * width + coords[2]] = v;
    }
    out
}

/// Mean intensity per radial ring around the center of a planar image.
///
/// Ring `k` (1-based) holds pixels with `floor(bins * r / r_max) == k`,
/// where `r` is the distance to `(rows / 2, cols / 2)`. The center ring 0 is
/// not reported. Rings without pixels are NaN.
///
/// # Errors
/// [`Error::ShapeMismatch`] for a non-planar image, [`Error::InvalidConfig`]
/// for zero bins.
pub fn radial_mean(image: &Buffer3<f32>, bins: usize) -> Result<Vec<f64>> {
    let [depth, rows, cols] = image.shape();
    if depth != 1 {
        return Err(Error::shape_mismatch("planar image", [1, rows, cols], image.shape()));
    }
    if bins == 0 {
        return Err(Error::invalid_config("radial_mean needs at least one bin"));
    }

    let (cy, cx) = (rows as f64 / 2.0, cols as f64 / 2.0);
    let radius = |y: usize, x: usize| (y as f64 - cy).hypot(x as f64 - cx);
    let r_max = (0..rows)
        .flat_map(|y| (0..cols).map(move |x| (y, x)))
        .map(|(y, x)| radius(y, x))
        .fold(0.0f64, f64::max);
    if r_max == 0.0 {
        return Ok(Vec::new());
    }

    let ring_of = |y: usize, x: usize| (bins as f64 * radius(y, x) / r_max) as usize;
    let rings = (0..rows)
        .flat_map(|y| (0..cols).map(move |x| (y, x)))
        .map(|(y, x)| ring_of(y, x))
        .max()
        .unwrap_or(0);

    let mut sums = vec![0.0f64; rings + 1];
    let mut counts = vec![0usize; rings + 1];
    for y in 0..rows {
        for x in 0..cols {
            let ring = ring_of(y, x);
            sums[ring] += image[(0, y, x)] as f64;
            counts[ring] += 1;
        }
    }

    Ok((1..=rings)
        .map(|k| {
            if counts[k] == 0 {
                f64::NAN
            } else {
                sums[k] / counts[k] as f64
            }
        })
        .collect())
}
