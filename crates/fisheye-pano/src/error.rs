//! Error taxonomy shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

/// Failure raised by a loader, the stitching engine, the lens model, the
/// resampler, or an artifact sink.
///
/// Payloads are plain strings so the error stays `Clone + PartialEq` and can
/// be stored in [`crate::PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanoError {
    #[error("could not read image '{resource}': {reason}")]
    ResourceNotFound { resource: String, reason: String },

    #[error("image manifest is empty")]
    EmptyManifest,

    #[error("not enough images for stitching")]
    NeedMoreImages,

    #[error("homography estimation failed")]
    HomographyEstimationFailed,

    #[error("camera parameter adjustment failed")]
    CameraParameterAdjustmentFailed,

    #[error("unknown stitching status (code: {0})")]
    UnknownStitchStatus(i32),

    #[error("stitching engine reported success without a panorama")]
    MissingPanorama,

    #[error("dimension mismatch: expected {}x{}, got {}x{}", expected[0], expected[1], actual[0], actual[1])]
    DimensionMismatch { expected: [u32; 2], actual: [u32; 2] },

    #[error("degenerate image size {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    #[error("failed to write {}: {reason}", path.display())]
    IoFailure { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PanoError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::IoFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn not_found(resource: &str, err: impl std::fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource: resource.to_string(),
            reason: err.to_string(),
        }
    }
}
