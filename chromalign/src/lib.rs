//! Chromalign - chromatic shift analysis of multi-channel spot images.
//!
//! Each channel of a (C, Z, Y, X) fluorescence volume is segmented into
//! labeled spots. Spot properties give one position per spot, and positions
//! are matched across every ordered channel pair to measure how far the
//! channels are displaced from one another.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chromalign::{PipelineConfig, analyze_image};
//!
//! let config = PipelineConfig::from_yaml(&std::fs::read_to_string("chromalign.yaml")?)?;
//! let output = analyze_image(&image, &config)?;
//!
//! for record in &output.report.distances {
//!     println!("{:?}: {:?}", record.channels, record.summary());
//! }
//! ```

pub mod config;
pub mod error;
pub mod fft;
pub mod matching;
pub mod merge;
pub mod pipeline;
pub mod properties;
pub mod segmentation;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Core types
// ============================================================================

pub use common::buffer3::{Buffer3, Shape3};
pub use glam::DVec3;
pub use error::{Error, Result};
pub use volume::{MultiChannelVolume, Shape4};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    ArtifactPolicy, PipelineConfig, SegmentationConfig, SegmentationMethod, SpotAnalysisConfig,
};

// ============================================================================
// Segmentation and spot analysis
// ============================================================================

pub use merge::merge_channel_segmentation;
pub use properties::{
    ArtifactFilter, CenterCrossFilter, ChannelSpots, KeepAllRegions, SpotProperty,
    extract_channel_spots, region_properties,
};
pub use segmentation::segment_channel;

// ============================================================================
// Matching
// ============================================================================

pub use matching::{
    DistanceSummary, MutualMatch, PairwiseDistanceRecord, compute_distances_matrix,
    mutual_matches,
};

// ============================================================================
// Pipelines
// ============================================================================

pub use pipeline::{
    AnalysisReport, PipelineOutput, SegmentationPipeline, SpotAnalysis, SpotAnalysisPipeline,
    analyze_image, compute_spot_properties, segment_image,
};

// ============================================================================
// Spectra
// ============================================================================

pub use fft::{RADIAL_MEAN_BINS, fft_2d, fft_3d, radial_mean};
