//! Synthetic buffers shared by unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::{ChannelOrder, PixelBuffer};

/// Smooth, non-repeating RGB ramp; every pixel differs from its neighbors.
pub(crate) fn gradient_buffer(w: u32, h: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            data.push((x * 255 / w.max(1)) as u8);
            data.push((y * 255 / h.max(1)) as u8);
            data.push(((x + y) * 7 % 256) as u8);
        }
    }
    PixelBuffer::from_raw(w, h, ChannelOrder::Rgb, data).unwrap()
}

/// Random blocky texture, reproducible from `seed`.
///
/// Blocks of `block` pixels keep the texture registrable after smoothing.
pub(crate) fn textured_scene(w: u32, h: u32, block: u32, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = w.div_ceil(block);
    let bh = h.div_ceil(block);
    let cells: Vec<[u8; 3]> = (0..bw * bh)
        .map(|_| [rng.gen(), rng.gen(), rng.gen()])
        .collect();
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            let c = cells[((y / block) * bw + x / block) as usize];
            data.extend_from_slice(&c);
        }
    }
    PixelBuffer::from_raw(w, h, ChannelOrder::Rgb, data).unwrap()
}

/// Copy the `w x h` window of `scene` whose top-left corner is `(x0, y0)`.
pub(crate) fn crop(scene: &PixelBuffer, x0: u32, y0: u32, w: u32, h: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in y0..y0 + h {
        let row = scene.row(y);
        data.extend_from_slice(&row[(x0 * 3) as usize..((x0 + w) * 3) as usize]);
    }
    PixelBuffer::from_raw(w, h, scene.channel_order(), data).unwrap()
}
