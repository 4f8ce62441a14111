//! Dense destination-to-source coordinate maps.

use rayon::prelude::*;

use super::{LensConfig, PixelMapper};
use crate::error::PanoError;

/// Per-pixel source coordinates for a destination grid.
///
/// `get(x, y)` is the source location sampled for destination pixel
/// `(x, y)`. Unmappable pixels hold `NaN`, which the resampler treats as out
/// of bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMap {
    width: u32,
    height: u32,
    source_size: [u32; 2],
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl CoordinateMap {
    /// Sample `mapper` at every destination pixel. Rows are filled in
    /// parallel; the result does not depend on the thread count.
    pub fn from_mapper(
        width: u32,
        height: u32,
        source_size: [u32; 2],
        mapper: &dyn PixelMapper,
    ) -> Result<Self, PanoError> {
        if width == 0 || height == 0 {
            return Err(PanoError::DegenerateImage { width, height });
        }
        if source_size[0] == 0 || source_size[1] == 0 {
            return Err(PanoError::DegenerateImage {
                width: source_size[0],
                height: source_size[1],
            });
        }

        let n = width as usize * height as usize;
        let mut map_x = vec![f32::NAN; n];
        let mut map_y = vec![f32::NAN; n];
        map_x
            .par_chunks_mut(width as usize)
            .zip(map_y.par_chunks_mut(width as usize))
            .enumerate()
            .for_each(|(y, (row_x, row_y))| {
                for (x, (mx, my)) in row_x.iter_mut().zip(row_y.iter_mut()).enumerate() {
                    if let Some(src) = mapper.source_pixel([x as f64, y as f64]) {
                        *mx = src[0] as f32;
                        *my = src[1] as f32;
                    }
                }
            });

        Ok(Self {
            width,
            height,
            source_size,
            map_x,
            map_y,
        })
    }

    /// Destination width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Destination height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[width, height]` of the source image the map expects.
    pub fn source_size(&self) -> [u32; 2] {
        self.source_size
    }

    /// Number of entries (`width * height`).
    pub fn len(&self) -> usize {
        self.map_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map_x.is_empty()
    }

    /// Source `[x, y]` for destination pixel `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 2] {
        let i = y as usize * self.width as usize + x as usize;
        [self.map_x[i], self.map_y[i]]
    }

    /// Source x coordinates, row-major.
    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    /// Source y coordinates, row-major.
    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }
}

/// Build the distortion map for a `width x height` image.
///
/// The map has the image's own size and expects a source of the same size.
pub fn build_map(width: u32, height: u32, lens: &LensConfig) -> Result<CoordinateMap, PanoError> {
    let model = lens.resolve(width, height)?;
    tracing::debug!(
        "lens map {}x{}: K={:?} distortion={:?}",
        width,
        height,
        model.intrinsics(),
        model.distortion()
    );
    model.build_map()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::RadialTangentialDistortion;

    fn displacement(map: &CoordinateMap, x: u32, y: u32) -> f32 {
        let s = map.get(x, y);
        ((s[0] - x as f32).powi(2) + (s[1] - y as f32).powi(2)).sqrt()
    }

    #[test]
    fn map_has_one_entry_per_pixel() {
        for &(w, h) in &[(1u32, 1u32), (7, 3), (150, 100)] {
            let map = build_map(w, h, &LensConfig::default()).unwrap();
            assert_eq!(map.len(), (w * h) as usize);
            assert_eq!(map.map_y().len(), (w * h) as usize);
            assert_eq!((map.width(), map.height()), (w, h));
            assert_eq!(map.source_size(), [w, h]);
        }
    }

    #[test]
    fn center_pixel_maps_to_itself() {
        for &(w, h) in &[(2u32, 2u32), (150, 100), (640, 480)] {
            let map = build_map(w, h, &LensConfig::default()).unwrap();
            let s = map.get(w / 2, h / 2);
            assert_eq!(s, [(w / 2) as f32, (h / 2) as f32]);
        }
    }

    #[test]
    fn displacement_grows_outward() {
        let (w, h) = (160u32, 120u32);
        let map = build_map(w, h, &LensConfig::default()).unwrap();
        let (cx, cy) = (w / 2, h / 2);

        // Horizontal, vertical and diagonal rays from the principal point.
        let rays: [&dyn Fn(u32) -> (u32, u32); 3] = [
            &|t| (cx + t, cy),
            &|t| (cx, cy + t),
            &|t| (cx + t, cy + t * 3 / 4),
        ];
        for ray in rays {
            let mut prev = 0.0f32;
            for t in 0..cy {
                let (x, y) = ray(t);
                let d = displacement(&map, x, y);
                assert!(d >= prev, "displacement shrank at t={t}: {d} < {prev}");
                prev = d;
            }
        }
    }

    #[test]
    fn barrel_map_samples_outside_the_source_near_corners() {
        let map = build_map(100, 100, &LensConfig::default()).unwrap();
        let s = map.get(0, 0);
        assert!(s[0] < 0.0 && s[1] < 0.0);
    }

    #[test]
    fn identity_distortion_gives_identity_map() {
        let lens = LensConfig {
            distortion: RadialTangentialDistortion::default(),
            ..LensConfig::default()
        };
        let map = build_map(9, 5, &lens).unwrap();
        for y in 0..5 {
            for x in 0..9 {
                assert_eq!(map.get(x, y), [x as f32, y as f32]);
            }
        }
    }

    #[test]
    fn zero_dimension_is_degenerate() {
        assert_eq!(
            build_map(0, 0, &LensConfig::default()).unwrap_err(),
            PanoError::DegenerateImage {
                width: 0,
                height: 0
            }
        );
    }

    #[test]
    fn unmappable_pixels_are_nan() {
        struct Nothing;
        impl PixelMapper for Nothing {
            fn source_pixel(&self, _: [f64; 2]) -> Option<[f64; 2]> {
                None
            }
            fn destination_pixel(&self, _: [f64; 2]) -> Option<[f64; 2]> {
                None
            }
        }
        let map = CoordinateMap::from_mapper(3, 2, [3, 2], &Nothing).unwrap();
        assert!(map.map_x().iter().all(|v| v.is_nan()));
    }
}
