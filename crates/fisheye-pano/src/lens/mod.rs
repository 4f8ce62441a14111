//! Parametric lens model and the dense coordinate maps derived from it.

mod map;
mod model;

pub use map::{build_map, CoordinateMap};
pub use model::{
    CameraIntrinsics, LensConfig, LensModel, RadialTangentialDistortion, UndistortConfig,
};

/// Mapping between destination (output) pixels and source (input) pixels.
///
/// Both methods must be approximate inverses of each other. Return `None`
/// when a point cannot be mapped.
///
/// # Example
///
/// ```
/// use fisheye_pano::lens::{CoordinateMap, PixelMapper};
///
/// struct Identity;
///
/// impl PixelMapper for Identity {
///     fn source_pixel(&self, p: [f64; 2]) -> Option<[f64; 2]> {
///         Some(p)
///     }
///     fn destination_pixel(&self, p: [f64; 2]) -> Option<[f64; 2]> {
///         Some(p)
///     }
/// }
///
/// let map = CoordinateMap::from_mapper(4, 3, [4, 3], &Identity).unwrap();
/// assert_eq!(map.get(2, 1), [2.0, 1.0]);
/// ```
pub trait PixelMapper: Sync {
    /// Source location sampled for a destination pixel.
    fn source_pixel(&self, destination_xy: [f64; 2]) -> Option<[f64; 2]>;
    /// Destination pixel that samples the given source location.
    fn destination_pixel(&self, source_xy: [f64; 2]) -> Option<[f64; 2]>;
}
