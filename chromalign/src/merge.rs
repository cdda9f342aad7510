//! Assembly of per-channel label volumes into one multi-channel volume.

use common::buffer3::Buffer3;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::volume::{MultiChannelVolume, Shape4};

/// Stack per-channel label volumes into a zero-initialized `(C, Z, Y, X)` volume.
///
/// Channel `c` of the output is bit-identical to `per_channel[c]`; labels stay
/// channel-local. Each channel is copied into its own disjoint slot.
///
/// # Errors
/// [`Error::ShapeMismatch`] when the channel count or any channel's spatial
/// shape disagrees with `output_shape`.
pub fn merge_channel_segmentation(
    per_channel: &[Buffer3<u32>],
    output_shape: Shape4,
) -> Result<MultiChannelVolume<u32>> {
    let [channels, depth, height, width] = output_shape;
    if per_channel.len() != channels {
        return Err(Error::shape_mismatch(
            "merged channel count",
            [channels],
            [per_channel.len()],
        ));
    }
    let channel_shape = [depth, height, width];
    if let Some(labels) = per_channel.iter().find(|l| l.shape() != channel_shape) {
        return Err(Error::shape_mismatch(
            "channel labels",
            channel_shape,
            labels.shape(),
        ));
    }

    let mut merged = MultiChannelVolume::zeros(output_shape);
    let channel_len = merged.channel_len();
    if channel_len > 0 {
        merged
            .data_mut()
            .par_chunks_exact_mut(channel_len)
            .zip(per_channel.par_iter())
            .for_each(|(slot, labels)| slot.copy_from_slice(labels.voxels()));
    }

    tracing::debug!(
        "Merged {} channel label volumes into {:?}",
        channels,
        output_shape
    );
    Ok(merged)
}
