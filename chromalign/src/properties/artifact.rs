//! Policies that discard calibration-pattern artifacts from a region list.

use crate::config::ArtifactPolicy;

use super::SpotProperty;

/// Chooses regions that are not spots and must be dropped before matching.
///
/// Implementations only select; the caller removes the selected regions and
/// keeps the remaining ones in their original order.
pub trait ArtifactFilter: Send + Sync {
    /// Indices into `properties` of the regions to discard.
    fn artifacts(&self, properties: &[SpotProperty]) -> Vec<usize>;

    fn name(&self) -> &'static str;
}

/// Drops the single region with the largest area.
///
/// Argolight grids carry a central cross that is larger than any spot. A
/// dense cluster of merged spots can outgrow it, in which case the cluster is
/// dropped instead. Ties keep the first region with the largest area.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterCrossFilter;

impl ArtifactFilter for CenterCrossFilter {
    fn artifacts(&self, properties: &[SpotProperty]) -> Vec<usize> {
        let mut largest: Option<(usize, usize)> = None;
        for (idx, property) in properties.iter().enumerate() {
            if largest.is_none_or(|(_, area)| property.area > area) {
                largest = Some((idx, property.area));
            }
        }
        largest.map(|(idx, _)| vec![idx]).unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "center_cross"
    }
}

/// Keeps every region.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAllRegions;

impl ArtifactFilter for KeepAllRegions {
    fn artifacts(&self, _properties: &[SpotProperty]) -> Vec<usize> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "keep_all"
    }
}

impl ArtifactPolicy {
    /// The filter implementing this policy.
    pub fn filter(self) -> Box<dyn ArtifactFilter> {
        match self {
            ArtifactPolicy::CenterCross => Box::new(CenterCrossFilter),
            ArtifactPolicy::KeepAll => Box::new(KeepAllRegions),
        }
    }
}
