//! Owned 3-channel 8-bit pixel buffers.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::PanoError;

/// Byte order of the three color channels of every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// Canonical order used by every stage downstream of the loader.
    #[default]
    Rgb,
    Bgr,
}

/// Dense, row-major, 3-channel image.
///
/// Invariants: `width * height > 0` and `data.len() == width * height * 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw interleaved bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, PanoError> {
        if width == 0 || height == 0 {
            return Err(PanoError::DegenerateImage { width, height });
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            // Report the row count the byte length actually covers.
            let row_bytes = width as usize * 3;
            return Err(PanoError::DimensionMismatch {
                expected: [width, height],
                actual: [width, (data.len() / row_bytes) as u32],
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Buffer of a single color.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Result<Self, PanoError> {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * 3);
        for _ in 0..n {
            data.extend_from_slice(&color);
        }
        Self::from_raw(width, height, ChannelOrder::Rgb, data)
    }

    /// Take ownership of an RGB image from the `image` crate.
    pub fn from_rgb_image(img: RgbImage) -> Result<Self, PanoError> {
        let (w, h) = img.dimensions();
        Self::from_raw(w, h, ChannelOrder::Rgb, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[width, height]`
    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)` in the buffer's own channel order.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// One row of interleaved bytes.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 3;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Convert to the canonical RGB order, consuming `self`.
    pub fn to_canonical(mut self) -> Self {
        if self.order == ChannelOrder::Bgr {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.order = ChannelOrder::Rgb;
        }
        self
    }

    /// RGB image for encoding or display.
    pub fn to_rgb_image(&self) -> RgbImage {
        let canonical = self.clone().to_canonical();
        // Length invariant is enforced at construction.
        RgbImage::from_raw(self.width, self.height, canonical.data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_buffer_is_degenerate() {
        let err = PixelBuffer::from_raw(0, 4, ChannelOrder::Rgb, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            PanoError::DegenerateImage {
                width: 0,
                height: 4
            }
        );
    }

    #[test]
    fn short_data_is_rejected() {
        let err = PixelBuffer::from_raw(4, 4, ChannelOrder::Rgb, vec![0; 4 * 3 * 3]).unwrap_err();
        assert!(matches!(err, PanoError::DimensionMismatch { .. }));
    }

    #[test]
    fn bgr_is_swapped_to_rgb() {
        let buf = PixelBuffer::from_raw(1, 1, ChannelOrder::Bgr, vec![10, 20, 30]).unwrap();
        let rgb = buf.to_canonical();
        assert_eq!(rgb.channel_order(), ChannelOrder::Rgb);
        assert_eq!(rgb.pixel(0, 0), [30, 20, 10]);
    }

    #[test]
    fn rgb_image_roundtrip_keeps_pixels() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([1, 2, 3]));
        let buf = PixelBuffer::from_rgb_image(img.clone()).unwrap();
        assert_eq!(buf.pixel(2, 1), [1, 2, 3]);
        assert_eq!(buf.to_rgb_image(), img);
    }
}
