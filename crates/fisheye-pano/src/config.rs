//! Top-level pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PanoError;
use crate::lens::LensConfig;
use crate::output::ArtifactNames;
use crate::remap::RemapConfig;
use crate::stitch::StitcherConfig;

/// Everything the orchestrator and the bundled engine can be tuned with.
///
/// Every section is optional in JSON; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lens: LensConfig,
    pub remap: RemapConfig,
    pub stitcher: StitcherConfig,
    pub artifacts: ArtifactNames,
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, PanoError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            PanoError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, PanoError> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| PanoError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no image size could make sensible.
    pub fn validate(&self) -> Result<(), PanoError> {
        let d = &self.lens.distortion;
        if ![d.k1, d.k2, d.p1, d.p2].iter().all(|v| v.is_finite()) {
            return Err(PanoError::InvalidConfig(
                "distortion coefficients must be finite".to_string(),
            ));
        }
        for (name, v) in [
            ("fx", self.lens.fx),
            ("fy", self.lens.fy),
            ("cx", self.lens.cx),
            ("cy", self.lens.cy),
        ] {
            if let Some(v) = v {
                if !v.is_finite() {
                    return Err(PanoError::InvalidConfig(format!("{name} must be finite")));
                }
            }
        }
        let s = &self.stitcher;
        if !(s.max_overlap_fraction > 0.0 && s.max_overlap_fraction <= 1.0) {
            return Err(PanoError::InvalidConfig(
                "stitcher.max_overlap_fraction must be in (0, 1]".to_string(),
            ));
        }
        if s.min_images == 0 {
            return Err(PanoError::InvalidConfig(
                "stitcher.min_images must be at least 1".to_string(),
            ));
        }
        if self.artifacts.panorama.is_empty() || self.artifacts.distorted.is_empty() {
            return Err(PanoError::InvalidConfig(
                "artifact names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::RadialTangentialDistortion;
    use crate::remap::Interpolation;

    #[test]
    fn empty_object_is_default() {
        let cfg = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.artifacts.panorama, "panorama.jpg");
        assert_eq!(cfg.artifacts.distorted, "fisheye_panorama.jpg");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r#"{
                "lens": { "distortion": { "k1": 0.1 } },
                "remap": { "interpolation": "nearest" },
                "artifacts": { "panorama": "out.png" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.lens.distortion.k1, 0.1);
        assert_eq!(cfg.lens.distortion.k2, 0.2);
        assert_eq!(cfg.remap.interpolation, Interpolation::Nearest);
        assert_eq!(cfg.remap.border, [0, 0, 0]);
        assert_eq!(cfg.artifacts.panorama, "out.png");
        assert_eq!(cfg.artifacts.distorted, "fisheye_panorama.jpg");
        assert_eq!(cfg.stitcher, StitcherConfig::default());
    }

    #[test]
    fn partial_distortion_keeps_reference_coefficients() {
        let cfg =
            PipelineConfig::from_json_str(r#"{ "lens": { "distortion": { "k1": 0.5 } } }"#)
                .unwrap();
        assert_eq!(cfg.lens.distortion, RadialTangentialDistortion::FISHEYE);

        let cfg = PipelineConfig::from_json_str(r#"{ "lens": { "distortion": { "p2": 0.01 } } }"#)
            .unwrap();
        assert_eq!(cfg.lens.distortion.k1, 0.5);
        assert_eq!(cfg.lens.distortion.k2, 0.2);
        assert_eq!(cfg.lens.distortion.p1, 0.0);
        assert_eq!(cfg.lens.distortion.p2, 0.01);
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        let err = PipelineConfig::from_json_str("{ lens: ").unwrap_err();
        assert!(matches!(err, PanoError::InvalidConfig(_)));
    }

    #[test]
    fn out_of_range_overlap_fraction_is_rejected() {
        let err =
            PipelineConfig::from_json_str(r#"{ "stitcher": { "max_overlap_fraction": 1.5 } }"#)
                .unwrap_err();
        assert!(matches!(err, PanoError::InvalidConfig(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "remap": { "border": [9, 8, 7] } }"#).unwrap();
        let cfg = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.remap.border, [9, 8, 7]);

        let missing = PipelineConfig::from_json_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(PanoError::InvalidConfig(_))));
    }
}
