//! Pinhole intrinsics plus Brown-Conrady radial-tangential distortion.

use nalgebra::{Matrix2, Matrix3, Vector2};
use serde::{Deserialize, Serialize};

use super::{CoordinateMap, PixelMapper};
use crate::error::PanoError;

/// Focal lengths and principal point, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Half-size focal lengths with the principal point at the image center.
    pub fn from_image_size(width: u32, height: u32) -> Self {
        let half = Vector2::new(width as f64, height as f64) / 2.0;
        Self {
            fx: half.x,
            fy: half.y,
            cx: half.x,
            cy: half.y,
        }
    }

    /// Finite values and non-zero focal lengths.
    pub fn is_valid(self) -> bool {
        let finite = [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite());
        finite && self.fx.abs() > 1e-12 && self.fy.abs() > 1e-12
    }

    pub fn matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    fn focal(self) -> Vector2<f64> {
        Vector2::new(self.fx, self.fy)
    }

    fn center(self) -> Vector2<f64> {
        Vector2::new(self.cx, self.cy)
    }

    /// Pixel to normalized image plane. Intrinsics must be valid.
    pub fn pixel_to_normalized(self, pixel: Vector2<f64>) -> Vector2<f64> {
        (pixel - self.center()).component_div(&self.focal())
    }

    pub fn normalized_to_pixel(self, normalized: Vector2<f64>) -> Vector2<f64> {
        normalized.component_mul(&self.focal()) + self.center()
    }
}

/// Brown-Conrady radial-tangential distortion coefficients.
///
/// `Default` is the identity (all zeros). Deserialization fills missing
/// coefficients from [`Self::FISHEYE`], the operating point of the
/// panorama warp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default = "RadialTangentialDistortion::fisheye")]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

impl RadialTangentialDistortion {
    /// Barrel distortion with tangential terms disabled.
    pub const FISHEYE: Self = Self {
        k1: 0.5,
        k2: 0.2,
        p1: 0.0,
        p2: 0.0,
    };

    fn fisheye() -> Self {
        Self::FISHEYE
    }

    fn is_finite(self) -> bool {
        [self.k1, self.k2, self.p1, self.p2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Apply distortion on the normalized image plane.
    pub fn distort_normalized(self, p: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = p.norm_squared();
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        let tangential = Vector2::new(
            2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        );
        p * radial + tangential
    }

    /// Jacobian of [`Self::distort_normalized`] at `p`.
    pub fn jacobian(self, p: Vector2<f64>) -> Matrix2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = p.norm_squared();
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        // d(radial)/dx = 2x * slope, d(radial)/dy = 2y * slope
        let slope = self.k1 + 2.0 * self.k2 * r2;
        let cross = 2.0 * x * y * slope + 2.0 * self.p1 * x + 2.0 * self.p2 * y;
        Matrix2::new(
            radial + 2.0 * x * x * slope + 2.0 * self.p1 * y + 6.0 * self.p2 * x,
            cross,
            cross,
            radial + 2.0 * y * y * slope + 6.0 * self.p1 * y + 2.0 * self.p2 * x,
        )
    }
}

/// Newton solver settings for [`LensModel::undistort_pixel_with`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UndistortConfig {
    pub max_iters: usize,
    /// Converged once the residual on the normalized plane is below this.
    pub eps: f64,
}

impl Default for UndistortConfig {
    fn default() -> Self {
        Self {
            max_iters: 20,
            eps: 1e-12,
        }
    }
}

/// User-facing lens parameters.
///
/// Any intrinsic left as `None` is derived from the image size when the
/// config is resolved, see [`CameraIntrinsics::from_image_size`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LensConfig {
    pub distortion: RadialTangentialDistortion,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
    pub cx: Option<f64>,
    pub cy: Option<f64>,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            distortion: RadialTangentialDistortion::FISHEYE,
            fx: None,
            fy: None,
            cx: None,
            cy: None,
        }
    }
}

impl LensConfig {
    /// Resolve into a concrete model for an image of the given size.
    pub fn resolve(&self, width: u32, height: u32) -> Result<LensModel, PanoError> {
        if width == 0 || height == 0 {
            return Err(PanoError::DegenerateImage { width, height });
        }
        let derived = CameraIntrinsics::from_image_size(width, height);
        let intrinsics = CameraIntrinsics {
            fx: self.fx.unwrap_or(derived.fx),
            fy: self.fy.unwrap_or(derived.fy),
            cx: self.cx.unwrap_or(derived.cx),
            cy: self.cy.unwrap_or(derived.cy),
        };
        if !intrinsics.is_valid() {
            return Err(PanoError::InvalidConfig(format!(
                "lens intrinsics must be finite with non-zero focal lengths, got {intrinsics:?}"
            )));
        }
        let d = self.distortion;
        if !d.is_finite() {
            return Err(PanoError::InvalidConfig(format!(
                "distortion coefficients must be finite, got {d:?}"
            )));
        }
        Ok(LensModel {
            intrinsics,
            distortion: d,
            image_size: [width, height],
        })
    }
}

/// Intrinsics and distortion resolved for one image size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LensModel {
    intrinsics: CameraIntrinsics,
    distortion: RadialTangentialDistortion,
    image_size: [u32; 2],
}

impl LensModel {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }

    pub fn distortion(&self) -> RadialTangentialDistortion {
        self.distortion
    }

    /// `[width, height]` the model was resolved for.
    pub fn image_size(&self) -> [u32; 2] {
        self.image_size
    }

    /// Camera matrix `K`.
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.matrix()
    }

    /// Source pixel sampled for an output pixel: the output pixel is treated
    /// as undistorted and pushed through the lens.
    pub fn distort_pixel(&self, undistorted_pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        let k = self.intrinsics;
        let n = k.pixel_to_normalized(Vector2::from(undistorted_pixel_xy));
        finite_pixel(k.normalized_to_pixel(self.distortion.distort_normalized(n)))
    }

    /// Inverse of [`Self::distort_pixel`] with default solver settings.
    pub fn undistort_pixel(&self, distorted_pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        self.undistort_pixel_with(distorted_pixel_xy, UndistortConfig::default())
    }

    /// Newton iteration on the normalized plane, starting from the distorted
    /// point itself. `None` if the Jacobian turns singular or the residual
    /// has not dropped below `cfg.eps` after `cfg.max_iters` steps.
    pub fn undistort_pixel_with(
        &self,
        distorted_pixel_xy: [f64; 2],
        cfg: UndistortConfig,
    ) -> Option<[f64; 2]> {
        let k = self.intrinsics;
        let d = self.distortion;
        let target = k.pixel_to_normalized(Vector2::from(distorted_pixel_xy));
        let mut u = target;

        for _ in 0..cfg.max_iters.max(1) {
            let residual = d.distort_normalized(u) - target;
            if !residual.iter().all(|v| v.is_finite()) {
                return None;
            }
            if residual.norm() <= cfg.eps {
                return finite_pixel(k.normalized_to_pixel(u));
            }
            u -= d.jacobian(u).try_inverse()? * residual;
        }

        let residual = d.distort_normalized(u) - target;
        if residual.norm() <= cfg.eps {
            finite_pixel(k.normalized_to_pixel(u))
        } else {
            None
        }
    }

    /// Dense map sampling this model for every pixel of its image size.
    pub fn build_map(&self) -> Result<CoordinateMap, PanoError> {
        let [w, h] = self.image_size;
        CoordinateMap::from_mapper(w, h, self.image_size, self)
    }
}

fn finite_pixel(p: Vector2<f64>) -> Option<[f64; 2]> {
    (p.x.is_finite() && p.y.is_finite()).then_some([p.x, p.y])
}

impl PixelMapper for LensModel {
    fn source_pixel(&self, destination_xy: [f64; 2]) -> Option<[f64; 2]> {
        self.distort_pixel(destination_xy)
    }

    fn destination_pixel(&self, source_xy: [f64; 2]) -> Option<[f64; 2]> {
        self.undistort_pixel(source_xy)
    }
}
