//! Configuration types for spot segmentation and cross-channel analysis.
//!
//! Every struct deserializes with `#[serde(default)]`, so a YAML document
//! only needs the fields it changes. Call `validate()` (or load through
//! [`PipelineConfig::from_yaml`], which does) before running a pipeline.

use std::fmt;
use std::str::FromStr;

use common::log_setup::LogConfig;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Enums
// ============================================================================

/// Thresholding strategy used to turn a smoothed channel into a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SegmentationMethod {
    /// Two-level threshold at `T * low` and `T * high`, where `T` is the
    /// Otsu threshold of the raw channel.
    Hysteresis,
    /// Seed local maxima above `T * 0.5` at the volume maximum, then apply
    /// the same hysteresis threshold. Keeps dim spots that have a clear peak.
    #[default]
    LocalMax,
}

impl SegmentationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentationMethod::Hysteresis => "hysteresis",
            SegmentationMethod::LocalMax => "local_max",
        }
    }
}

impl fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hysteresis" => Ok(SegmentationMethod::Hysteresis),
            "local_max" => Ok(SegmentationMethod::LocalMax),
            other => Err(Error::UnknownMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for SegmentationMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SegmentationMethod> for String {
    fn from(method: SegmentationMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Which labeled region, if any, is discarded as a calibration artifact.
///
/// The cross heuristic only holds for Argolight-style grids, so it must be
/// requested by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactPolicy {
    /// Keep every region.
    #[default]
    KeepAll,
    /// Drop the single largest region (the central cross of Argolight grids).
    CenterCross,
}

// ============================================================================
// Segmentation
// ============================================================================

/// Parameters of per-channel spot segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Minimum spot separation in voxels. Also the peak exclusion border and
    /// the side of the closing cube.
    pub min_distance: usize,
    /// Gaussian sigma per axis (z, y, x), in voxels. Zero skips an axis.
    pub sigma: [f32; 3],
    pub method: SegmentationMethod,
    /// (low, high) hysteresis factors applied to the Otsu threshold.
    pub hysteresis_levels: (f32, f32),
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_distance: 20,
            sigma: [1.0, 2.0, 2.0],
            method: SegmentationMethod::LocalMax,
            hysteresis_levels: (0.6, 0.9),
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_distance == 0 {
            return Err(Error::invalid_config("min_distance must be at least 1"));
        }
        if let Some(s) = self.sigma.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(Error::invalid_config(format!(
                "sigma must be finite and non-negative, got {s}"
            )));
        }
        let (low, high) = self.hysteresis_levels;
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) {
            return Err(Error::invalid_config(format!(
                "hysteresis levels must be within [0, 1], got ({low}, {high})"
            )));
        }
        if low > high {
            return Err(Error::invalid_config(format!(
                "hysteresis low level {low} exceeds high level {high}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Spot analysis
// ============================================================================

/// Parameters of spot property extraction and cross-channel matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotAnalysisConfig {
    pub artifact_policy: ArtifactPolicy,
    /// Physical size of a voxel as (z, y, x). Spot positions are scaled by it.
    pub pixel_size: Option<DVec3>,
    /// Matches at or beyond this distance are discarded.
    pub match_cutoff: f64,
    /// Per-axis weights of the matching distance. Unit weights when `None`.
    pub match_pixel_size: Option<DVec3>,
}

impl Default for SpotAnalysisConfig {
    fn default() -> Self {
        Self {
            artifact_policy: ArtifactPolicy::KeepAll,
            pixel_size: None,
            match_cutoff: 5.0,
            match_pixel_size: None,
        }
    }
}

impl SpotAnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.match_cutoff.is_finite() || self.match_cutoff <= 0.0 {
            return Err(Error::invalid_config(format!(
                "match_cutoff must be positive, got {}",
                self.match_cutoff
            )));
        }
        validate_pixel_size("pixel_size", self.pixel_size)?;
        validate_pixel_size("match_pixel_size", self.match_pixel_size)
    }
}

pub(crate) fn validate_pixel_size(name: &str, pixel_size: Option<DVec3>) -> Result<()> {
    if let Some(size) = pixel_size
        && (!size.is_finite() || size.min_element() <= 0.0)
    {
        return Err(Error::invalid_config(format!(
            "{name} must be positive on every axis, got {size:?}"
        )));
    }
    Ok(())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Full configuration of a segmentation and analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub analysis: SpotAnalysisConfig,
    /// Worker threads for a dedicated pool. Uses the global rayon pool when `None`.
    pub threads: Option<usize>,
    pub logging: LogConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.segmentation.validate()?;
        self.analysis.validate()?;
        if self.threads == Some(0) {
            return Err(Error::invalid_config("threads must be at least 1"));
        }
        Ok(())
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_defaults() {
        let config = SegmentationConfig::default();
        assert_eq!(config.min_distance, 20);
        assert_eq!(config.sigma, [1.0, 2.0, 2.0]);
        assert_eq!(config.method, SegmentationMethod::LocalMax);
        assert_eq!(config.hysteresis_levels, (0.6, 0.9));
        config.validate().unwrap();
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "hysteresis".parse::<SegmentationMethod>().unwrap(),
            SegmentationMethod::Hysteresis
        );
        assert_eq!(
            "local_max".parse::<SegmentationMethod>().unwrap(),
            SegmentationMethod::LocalMax
        );
        let err = "otsu".parse::<SegmentationMethod>().unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(ref name) if name == "otsu"));
    }

    #[test]
    fn test_artifact_policy_defaults_to_keep_all() {
        assert_eq!(SpotAnalysisConfig::default().artifact_policy, ArtifactPolicy::KeepAll);
        let config = PipelineConfig::from_yaml("analysis:\n  match_cutoff: 2.0\n").unwrap();
        assert_eq!(config.analysis.artifact_policy, ArtifactPolicy::KeepAll);
        let config =
            PipelineConfig::from_yaml("analysis:\n  artifact_policy: center_cross\n").unwrap();
        assert_eq!(config.analysis.artifact_policy, ArtifactPolicy::CenterCross);
    }

    #[test]
    fn test_invalid_segmentation_values() {
        let zero_distance = SegmentationConfig {
            min_distance: 0,
            ..Default::default()
        };
        assert!(matches!(zero_distance.validate(), Err(Error::InvalidConfig(_))));

        let negative_sigma = SegmentationConfig {
            sigma: [1.0, -2.0, 2.0],
            ..Default::default()
        };
        assert!(negative_sigma.validate().is_err());

        let swapped = SegmentationConfig {
            hysteresis_levels: (0.9, 0.6),
            ..Default::default()
        };
        assert!(swapped.validate().is_err());

        let out_of_range = SegmentationConfig {
            hysteresis_levels: (0.6, 1.5),
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_invalid_analysis_values() {
        let cutoff = SpotAnalysisConfig {
            match_cutoff: 0.0,
            ..Default::default()
        };
        assert!(cutoff.validate().is_err());

        let pixel = SpotAnalysisConfig {
            match_pixel_size: Some(DVec3::new(0.3, 0.0, 0.1)),
            ..Default::default()
        };
        let err = pixel.validate().unwrap_err();
        assert!(err.to_string().contains("match_pixel_size"));
    }

    #[test]
    fn test_yaml_partial_document_uses_defaults() {
        let yaml = "
segmentation:
  method: hysteresis
  min_distance: 5
analysis:
  artifact_policy: keep_all
  match_pixel_size: [0.2, 0.1, 0.1]
threads: 2
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.segmentation.method, SegmentationMethod::Hysteresis);
        assert_eq!(config.segmentation.min_distance, 5);
        assert_eq!(config.segmentation.sigma, [1.0, 2.0, 2.0]);
        assert_eq!(config.analysis.artifact_policy, ArtifactPolicy::KeepAll);
        assert_eq!(
            config.analysis.match_pixel_size,
            Some(DVec3::new(0.2, 0.1, 0.1))
        );
        assert_eq!(config.analysis.match_cutoff, 5.0);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_yaml_unknown_method_is_rejected() {
        let err = PipelineConfig::from_yaml("segmentation:\n  method: watershed\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
        assert!(err.to_string().contains("watershed"));
    }

    #[test]
    fn test_yaml_invalid_value_is_rejected_after_parse() {
        let err = PipelineConfig::from_yaml("threads: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_yaml_roundtrip_preserves_config() {
        let config = PipelineConfig {
            threads: Some(4),
            ..Default::default()
        };
        let text = config.to_yaml().unwrap();
        assert!(text.contains("local_max"));
        assert_eq!(PipelineConfig::from_yaml(&text).unwrap(), config);
    }
}
