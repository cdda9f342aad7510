//! Multi-channel volumes with an explicit channel axis.

use common::buffer3::{Buffer3, Shape3};

use crate::error::{Error, Result};

/// Shape of a [`MultiChannelVolume`] as `[channels, depth, height, width]`.
pub type Shape4 = [usize; 4];

/// A contiguous (C, Z, Y, X) array.
///
/// Each channel occupies one contiguous slot of `depth * height * width`
/// samples. Planar images use depth 1.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiChannelVolume<T> {
    data: Vec<T>,
    shape: Shape4,
}

impl<T> MultiChannelVolume<T> {
    /// Wrap existing (C, Z, Y, X) data. Fails if the length does not match.
    pub fn from_vec(shape: Shape4, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::shape_mismatch(
                "multi-channel data length",
                [expected],
                [data.len()],
            ));
        }
        Ok(Self { data, shape })
    }

    #[inline]
    pub fn shape(&self) -> Shape4 {
        self.shape
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    /// Spatial (Z, Y, X) shape shared by every channel.
    #[inline]
    pub fn channel_shape(&self) -> Shape3 {
        [self.shape[1], self.shape[2], self.shape[3]]
    }

    #[inline]
    pub fn channel_len(&self) -> usize {
        self.shape[1] * self.shape[2] * self.shape[3]
    }

    /// Borrow channel `c` as a flat (Z, Y, X) slice.
    #[inline]
    pub fn channel_slice(&self, c: usize) -> &[T] {
        let len = self.channel_len();
        &self.data[c * len..(c + 1) * len]
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Clone> MultiChannelVolume<T> {
    pub fn new_filled(shape: Shape4, value: T) -> Self {
        Self {
            data: vec![value; shape.iter().product()],
            shape,
        }
    }

    /// Copy channel `c` into its own volume.
    pub fn channel(&self, c: usize) -> Buffer3<T> {
        Buffer3::new(self.channel_shape(), self.channel_slice(c).to_vec())
    }

    /// Stack equally shaped channel volumes along a new leading axis.
    pub fn from_channels(channels: &[Buffer3<T>]) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(Error::invalid_config("at least one channel is required"));
        };
        let channel_shape = first.shape();
        let mut data = Vec::with_capacity(first.len() * channels.len());
        for channel in channels {
            if channel.shape() != channel_shape {
                return Err(Error::shape_mismatch(
                    "channel volume",
                    channel_shape,
                    channel.shape(),
                ));
            }
            data.extend_from_slice(channel.voxels());
        }
        let [depth, height, width] = channel_shape;
        Ok(Self {
            data,
            shape: [channels.len(), depth, height, width],
        })
    }
}

impl<T: Default + Clone> MultiChannelVolume<T> {
    pub fn zeros(shape: Shape4) -> Self {
        Self::new_filled(shape, T::default())
    }
}
