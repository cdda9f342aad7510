//! Multi-channel orchestration: segmentation, spot analysis and matching.
//!
//! Channels are independent until matching. Each stage fans out one task per
//! channel on the rayon pool and joins the results into an immutable list
//! before the next step (merge, or matching across channel pairs).


use common::buffer3::Buffer3;
use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SegmentationConfig, SpotAnalysisConfig};
use crate::error::{Error, Result};
use crate::matching::{
    MutualMatch, PairwiseDistanceRecord, compute_distances_matrix, mutual_matches,
};
use crate::merge::merge_channel_segmentation;
use crate::properties::{ArtifactFilter, ChannelSpots, extract_channel_spots};
use crate::segmentation::segment_channel;
use crate::volume::MultiChannelVolume;

// =============================================================================
// Results
// =============================================================================

/// Spots of every channel, in channel order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpotAnalysis {
    pub channels: Vec<ChannelSpots>,
}

impl SpotAnalysis {
    /// Spot positions per channel, the input of [`compute_distances_matrix`].
    pub fn positions(&self) -> Vec<Vec<DVec3>> {
        self.channels.iter().map(|c| c.positions.clone()).collect()
    }

    pub fn spot_counts(&self) -> Vec<usize> {
        self.channels.iter().map(ChannelSpots::len).collect()
    }
}

/// Spots and cross-channel distances of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub spots: SpotAnalysis,
    /// One record per ordered channel pair.
    pub distances: Vec<PairwiseDistanceRecord>,
    /// Matches that are nearest in both directions.
    pub mutual: Vec<MutualMatch>,
}

/// Output of [`analyze_image`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub labels: MultiChannelVolume<u32>,
    pub report: AnalysisReport,
}

// =============================================================================
// SegmentationPipeline
// =============================================================================

/// Segments every channel of an image in parallel and merges the labels.
#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    config: SegmentationConfig,
}

impl SegmentationPipeline {
    /// Validate `config` and build the pipeline.
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Label volume of `image`, same (C, Z, Y, X) shape, labels channel-local.
    pub fn run(&self, image: &MultiChannelVolume<f32>) -> Result<MultiChannelVolume<u32>> {
        let per_channel: Vec<Buffer3<u32>> = (0..image.channels())
            .into_par_iter()
            .map(|c| {
                let _span = tracing::debug_span!("segment", channel = c).entered();
                segment_channel(&image.channel(c), &self.config)
            })
            .collect();

        merge_channel_segmentation(&per_channel, image.shape())
    }
}

// =============================================================================
// SpotAnalysisPipeline
// =============================================================================

/// Extracts spots per channel and matches them across channels.
pub struct SpotAnalysisPipeline {
    config: SpotAnalysisConfig,
    filter: Box<dyn ArtifactFilter>,
}

impl std::fmt::Debug for SpotAnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotAnalysisPipeline")
            .field("config", &self.config)
            .field("filter", &self.filter.name())
            .finish()
    }
}

impl SpotAnalysisPipeline {
    /// Validate `config` and use the filter of its artifact policy.
    pub fn new(config: SpotAnalysisConfig) -> Result<Self> {
        let filter = config.artifact_policy.filter();
        Self::with_filter(config, filter)
    }

    /// Use a custom artifact filter instead of `config.artifact_policy`.
    pub fn with_filter(config: SpotAnalysisConfig, filter: Box<dyn ArtifactFilter>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &SpotAnalysisConfig {
        &self.config
    }

    /// Spot properties and positions of every channel.
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] when `image` and `labels` differ in shape.
    pub fn extract(
        &self,
        image: &MultiChannelVolume<f32>,
        labels: &MultiChannelVolume<u32>,
    ) -> Result<SpotAnalysis> {
        if image.shape() != labels.shape() {
            return Err(Error::shape_mismatch(
                "image and label volumes",
                image.shape(),
                labels.shape(),
            ));
        }

        let channels = (0..image.channels())
            .into_par_iter()
            .map(|c| {
                extract_channel_spots(
                    &image.channel(c),
                    &labels.channel(c),
                    self.filter.as_ref(),
                    self.config.pixel_size,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SpotAnalysis { channels })
    }

    /// Extract spots, then match them across every ordered channel pair.
    pub fn run(
        &self,
        image: &MultiChannelVolume<f32>,
        labels: &MultiChannelVolume<u32>,
    ) -> Result<AnalysisReport> {
        let spots = self.extract(image, labels)?;
        let distances = compute_distances_matrix(
            &spots.positions(),
            self.config.match_cutoff,
            self.config.match_pixel_size,
        )?;
        let mutual = mutual_matches(&distances);

        tracing::info!(
            "Analyzed {} channels: spots per channel {:?}, {} mutual matches",
            spots.channels.len(),
            spots.spot_counts(),
            mutual.len()
        );

        Ok(AnalysisReport {
            spots,
            distances,
            mutual,
        })
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Segment every channel of a (C, Z, Y, X) image.
pub fn segment_image(
    image: &MultiChannelVolume<f32>,
    config: &SegmentationConfig,
) -> Result<MultiChannelVolume<u32>> {
    SegmentationPipeline::new(config.clone())?.run(image)
}

/// Spot properties and positions of every channel of a labeled image.
pub fn compute_spot_properties(
    image: &MultiChannelVolume<f32>,
    labels: &MultiChannelVolume<u32>,
    config: &SpotAnalysisConfig,
) -> Result<SpotAnalysis> {
    SpotAnalysisPipeline::new(config.clone())?.extract(image, labels)
}

/// Segment, extract and match in one call.
///
/// Runs on a dedicated pool of `config.threads` workers when set, otherwise
/// on the global rayon pool.
pub fn analyze_image(
    image: &MultiChannelVolume<f32>,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    let segmentation = SegmentationPipeline::new(config.segmentation.clone())?;
    let analysis = SpotAnalysisPipeline::new(config.analysis.clone())?;

    let run = || -> Result<PipelineOutput> {
        let labels = segmentation.run(image)?;
        let report = analysis.run(image, &labels)?;
        Ok(PipelineOutput { labels, report })
    };

    match config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
            tracing::debug!("Running on a dedicated pool of {} threads", threads);
            pool.install(run)
        }
        None => run(),
    }
}
