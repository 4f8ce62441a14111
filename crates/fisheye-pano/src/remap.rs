//! Resampling a pixel buffer through a [`CoordinateMap`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::PanoError;
use crate::lens::CoordinateMap;

/// Interpolation kernel used when sampling between source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

/// Resampler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    pub interpolation: Interpolation,
    /// Fill value for destination pixels whose source falls outside the image.
    pub border: [u8; 3],
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
            border: [0, 0, 0],
        }
    }
}

/// Bilinear resampling with a black border.
pub fn resample(src: &PixelBuffer, map: &CoordinateMap) -> Result<PixelBuffer, PanoError> {
    resample_with(src, map, &RemapConfig::default())
}

/// Resample `src` through `map`.
///
/// The output has the map's dimensions and the source's channel order. A
/// source coordinate is in bounds iff it lies in `[0, w-1] x [0, h-1]`;
/// everything else (including `NaN`) receives `config.border`.
pub fn resample_with(
    src: &PixelBuffer,
    map: &CoordinateMap,
    config: &RemapConfig,
) -> Result<PixelBuffer, PanoError> {
    if src.size() != map.source_size() {
        return Err(PanoError::DimensionMismatch {
            expected: map.source_size(),
            actual: src.size(),
        });
    }

    let out_w = map.width() as usize;
    let mut data = vec![0u8; out_w * map.height() as usize * 3];
    data.par_chunks_mut(out_w * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let [sx, sy] = map.get(x as u32, y as u32);
                let value = match config.interpolation {
                    Interpolation::Bilinear => sample_bilinear(src, sx, sy),
                    Interpolation::Nearest => sample_nearest(src, sx, sy),
                };
                px.copy_from_slice(&value.unwrap_or(config.border));
            }
        });

    PixelBuffer::from_raw(map.width(), map.height(), src.channel_order(), data)
}

#[inline]
fn in_bounds(src: &PixelBuffer, x: f32, y: f32) -> bool {
    // NaN fails every comparison.
    x >= 0.0 && y >= 0.0 && x <= (src.width() - 1) as f32 && y <= (src.height() - 1) as f32
}

/// Bilinear sample of all three channels, `None` when out of bounds.
///
/// The `+1` neighbor is clamped on the last row/column so the inclusive
/// upper bound never reads past the image.
#[inline]
pub fn sample_bilinear(src: &PixelBuffer, x: f32, y: f32) -> Option<[u8; 3]> {
    if !in_bounds(src, x, y) {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = (1.0 - fx) * (1.0 - fy) * p00[c] as f32
            + fx * (1.0 - fy) * p10[c] as f32
            + (1.0 - fx) * fy * p01[c] as f32
            + fx * fy * p11[c] as f32;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

/// Nearest-neighbor sample, `None` when out of bounds.
#[inline]
pub fn sample_nearest(src: &PixelBuffer, x: f32, y: f32) -> Option<[u8; 3]> {
    if !in_bounds(src, x, y) {
        return None;
    }
    let xi = (x.round() as u32).min(src.width() - 1);
    let yi = (y.round() as u32).min(src.height() - 1);
    Some(src.pixel(xi, yi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::{build_map, LensConfig, PixelMapper};
    use crate::test_utils::gradient_buffer;

    struct Shift(f64, f64);

    impl PixelMapper for Shift {
        fn source_pixel(&self, p: [f64; 2]) -> Option<[f64; 2]> {
            Some([p[0] + self.0, p[1] + self.1])
        }
        fn destination_pixel(&self, p: [f64; 2]) -> Option<[f64; 2]> {
            Some([p[0] - self.0, p[1] - self.1])
        }
    }

    #[test]
    fn bilinear_midpoint_averages_neighbors() {
        let data = vec![
            0, 0, 0, 100, 100, 100, //
            100, 100, 100, 200, 200, 200,
        ];
        let src = PixelBuffer::from_raw(2, 2, crate::ChannelOrder::Rgb, data).unwrap();
        assert_eq!(sample_bilinear(&src, 0.5, 0.5), Some([100, 100, 100]));
        assert_eq!(sample_bilinear(&src, 0.5, 0.0), Some([50, 50, 50]));
    }

    #[test]
    fn inclusive_upper_bound_is_sampled() {
        let src = gradient_buffer(5, 4);
        assert_eq!(sample_bilinear(&src, 4.0, 3.0), Some(src.pixel(4, 3)));
        assert_eq!(sample_nearest(&src, 4.0, 3.0), Some(src.pixel(4, 3)));
        assert_eq!(sample_bilinear(&src, 4.01, 3.0), None);
        assert_eq!(sample_bilinear(&src, -0.01, 0.0), None);
        assert_eq!(sample_bilinear(&src, f32::NAN, 0.0), None);
    }

    #[test]
    fn identity_map_reproduces_source() {
        let src = gradient_buffer(12, 9);
        let map = CoordinateMap::from_mapper(12, 9, [12, 9], &Shift(0.0, 0.0)).unwrap();
        assert_eq!(resample(&src, &map).unwrap(), src);
    }

    #[test]
    fn out_of_bounds_gets_border_color() {
        let src = PixelBuffer::filled(10, 10, [255, 255, 255]).unwrap();
        let map = CoordinateMap::from_mapper(10, 10, [10, 10], &Shift(5.0, 0.0)).unwrap();
        let out = resample_with(
            &src,
            &map,
            &RemapConfig {
                border: [1, 2, 3],
                ..RemapConfig::default()
            },
        )
        .unwrap();
        for y in 0..10 {
            for x in 0..10 {
                let expected = if x <= 4 { [255, 255, 255] } else { [1, 2, 3] };
                assert_eq!(out.pixel(x, y), expected, "at ({x}, {y})");
            }
        }
    }

    #[test]
    fn fisheye_corners_are_black() {
        let src = PixelBuffer::filled(100, 100, [200, 180, 160]).unwrap();
        let map = build_map(100, 100, &LensConfig::default()).unwrap();
        let out = resample(&src, &map).unwrap();
        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
        assert_eq!(out.pixel(99, 99), [0, 0, 0]);
        assert_eq!(out.pixel(50, 50), [200, 180, 160]);
    }

    #[test]
    fn resampling_is_deterministic() {
        let src = gradient_buffer(64, 48);
        let map = build_map(64, 48, &LensConfig::default()).unwrap();
        let a = resample(&src, &map).unwrap();
        let b = resample(&src, &map).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let src = gradient_buffer(10, 10);
        let map = build_map(15, 10, &LensConfig::default()).unwrap();
        assert_eq!(
            resample(&src, &map).unwrap_err(),
            PanoError::DimensionMismatch {
                expected: [15, 10],
                actual: [10, 10]
            }
        );
    }

    #[test]
    fn output_takes_map_dimensions() {
        let src = gradient_buffer(10, 10);
        let map = CoordinateMap::from_mapper(4, 6, [10, 10], &Shift(1.0, 1.0)).unwrap();
        let out = resample_with(
            &src,
            &map,
            &RemapConfig {
                interpolation: Interpolation::Nearest,
                ..RemapConfig::default()
            },
        )
        .unwrap();
        assert_eq!(out.size(), [4, 6]);
        assert_eq!(out.pixel(2, 3), src.pixel(3, 4));
    }
}
