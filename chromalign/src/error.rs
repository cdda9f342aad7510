//! Error types for segmentation, spot analysis and cross-channel matching.

use thiserror::Error;

/// Errors that can occur while analyzing a multi-channel spot image.
///
/// A spot without a neighbor inside the matching cutoff is not an error; it
/// is left out of the [`crate::PairwiseDistanceRecord`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown segmentation method '{0}', expected 'hysteresis' or 'local_max'")]
    UnknownMethod(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cross-channel matching needs at least 2 channels, got {found}")]
    InsufficientChannels { found: usize },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yml::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub(crate) fn shape_mismatch(
        what: &'static str,
        expected: impl Into<Vec<usize>>,
        actual: impl Into<Vec<usize>>,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
