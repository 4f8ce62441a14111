//! Stitching engine contract.
//!
//! The orchestrator treats the engine as an opaque function from an ordered
//! image sequence to a status plus, on success, a panorama.
//! [`OverlapStitcher`] is the bundled deterministic implementation.

mod overlap;

pub use overlap::{OverlapStitcher, StitcherConfig};

use crate::buffer::PixelBuffer;
use crate::error::PanoError;

/// Outcome code reported by a stitching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StitchStatus {
    Success,
    NeedMoreImages,
    HomographyEstimationFailed,
    CameraParameterAdjustmentFailed,
    /// Any code outside the known set, kept verbatim.
    Unknown(i32),
}

impl StitchStatus {
    /// Decode the conventional integer status (0 = success, 1..=3 = known
    /// failures).
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::NeedMoreImages,
            2 => Self::HomographyEstimationFailed,
            3 => Self::CameraParameterAdjustmentFailed,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NeedMoreImages => 1,
            Self::HomographyEstimationFailed => 2,
            Self::CameraParameterAdjustmentFailed => 3,
            Self::Unknown(code) => code,
        }
    }

    /// The pipeline error for a non-success status, `None` for success.
    pub fn to_error(self) -> Option<PanoError> {
        match self {
            Self::Success => None,
            Self::NeedMoreImages => Some(PanoError::NeedMoreImages),
            Self::HomographyEstimationFailed => Some(PanoError::HomographyEstimationFailed),
            Self::CameraParameterAdjustmentFailed => {
                Some(PanoError::CameraParameterAdjustmentFailed)
            }
            Self::Unknown(code) => Some(PanoError::UnknownStitchStatus(code)),
        }
    }
}

/// Status plus the panorama, which is present only on success.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchOutput {
    pub status: StitchStatus,
    pub panorama: Option<PixelBuffer>,
}

impl StitchOutput {
    pub fn success(panorama: PixelBuffer) -> Self {
        Self {
            status: StitchStatus::Success,
            panorama: Some(panorama),
        }
    }

    pub fn failure(status: StitchStatus) -> Self {
        Self {
            status,
            panorama: None,
        }
    }

    /// Interpret the output: the panorama on success, the matching error
    /// otherwise.
    pub fn into_result(self) -> Result<PixelBuffer, PanoError> {
        if let Some(err) = self.status.to_error() {
            return Err(err);
        }
        self.panorama.ok_or(PanoError::MissingPanorama)
    }
}

/// Combines an ordered, non-empty sequence of overlapping images into one.
pub trait StitchingEngine {
    fn stitch(&mut self, images: &[PixelBuffer]) -> StitchOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_and_unknown_is_verbatim() {
        for code in [-3, 0, 1, 2, 3, 4, 99] {
            assert_eq!(StitchStatus::from_code(code).code(), code);
        }
        assert_eq!(StitchStatus::from_code(42), StitchStatus::Unknown(42));
    }

    #[test]
    fn each_failure_status_has_its_own_error() {
        assert_eq!(StitchStatus::Success.to_error(), None);
        assert_eq!(
            StitchStatus::NeedMoreImages.to_error(),
            Some(PanoError::NeedMoreImages)
        );
        assert_eq!(
            StitchStatus::HomographyEstimationFailed.to_error(),
            Some(PanoError::HomographyEstimationFailed)
        );
        assert_eq!(
            StitchStatus::CameraParameterAdjustmentFailed.to_error(),
            Some(PanoError::CameraParameterAdjustmentFailed)
        );
        assert_eq!(
            StitchStatus::Unknown(-1).to_error(),
            Some(PanoError::UnknownStitchStatus(-1))
        );
    }

    #[test]
    fn success_without_panorama_is_a_contract_violation() {
        let out = StitchOutput {
            status: StitchStatus::Success,
            panorama: None,
        };
        assert_eq!(out.into_result().unwrap_err(), PanoError::MissingPanorama);
    }

    #[test]
    fn failure_ignores_any_stray_buffer() {
        let out = StitchOutput {
            status: StitchStatus::NeedMoreImages,
            panorama: Some(PixelBuffer::filled(1, 1, [0, 0, 0]).unwrap()),
        };
        assert_eq!(out.into_result().unwrap_err(), PanoError::NeedMoreImages);
    }
}
