//! Deterministic translation-only stitcher for left-to-right photo strips.
//!
//! Each adjacent pair is registered by exhaustive search over horizontal
//! overlap and vertical shift, minimizing the mean absolute luma difference.
//! Large images are searched coarse-to-fine. Pair offsets are chained into
//! global placements, cropped to the vertical strip every image covers, and
//! feathered linearly across overlaps.

use std::ops::RangeInclusive;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use nalgebra::{Matrix3, Vector2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{StitchOutput, StitchStatus, StitchingEngine};
use crate::buffer::{ChannelOrder, PixelBuffer};

type LumaImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Registration and compositing parameters for [`OverlapStitcher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StitcherConfig {
    /// Fewer images than this yields `NeedMoreImages`.
    pub min_images: usize,
    /// Narrowest horizontal overlap considered (pixels).
    pub min_overlap_px: u32,
    /// Widest overlap considered, as a fraction of the narrower image.
    pub max_overlap_fraction: f32,
    /// Vertical misalignment searched in each direction (pixels).
    pub max_vertical_shift_px: u32,
    /// Minimum overlapping rows, as a fraction of the shorter image.
    pub min_overlap_rows_fraction: f32,
    /// Best mean absolute luma difference (0..255) accepted as a match.
    pub max_match_cost: f32,
    /// Minimum height of the strip shared by all images, as a fraction of the
    /// shortest image.
    pub min_common_height_fraction: f32,
    /// Gaussian sigma applied to luma before matching; `0` disables it.
    pub smoothing_sigma: f32,
    /// Images larger than this (longest side) are matched coarse-to-fine.
    pub registration_max_dim: u32,
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            min_images: 2,
            min_overlap_px: 8,
            max_overlap_fraction: 0.6,
            max_vertical_shift_px: 16,
            min_overlap_rows_fraction: 0.25,
            max_match_cost: 24.0,
            min_common_height_fraction: 0.5,
            smoothing_sigma: 1.0,
            registration_max_dim: 256,
        }
    }
}

/// Best translation of the right image relative to the left one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PairMatch {
    dx: i64,
    dy: i64,
    cost: f32,
}

/// Bundled [`StitchingEngine`].
#[derive(Debug, Clone, Default)]
pub struct OverlapStitcher {
    config: StitcherConfig,
}

impl OverlapStitcher {
    pub fn new(config: StitcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StitcherConfig {
        &self.config
    }

    /// Translation of `lb` relative to `la`, both luma planes of adjacent
    /// images.
    fn register_pair(&self, la: &LumaImage, lb: &LumaImage) -> Option<PairMatch> {
        let cfg = &self.config;
        let longest = la.width().max(la.height()).max(lb.width()).max(lb.height());
        let scale = longest.div_ceil(cfg.registration_max_dim.max(1)).max(1) as i64;
        let full = SearchBounds::new(la, lb, cfg, 1)?;
        if scale == 1 {
            return search(la, lb, full.dx, full.dy, full.rows_min);
        }

        let shrink = |img: &LumaImage| {
            let w = (img.width() as i64 / scale).max(1) as u32;
            let h = (img.height() as i64 / scale).max(1) as u32;
            imageops::resize(img, w, h, FilterType::Triangle)
        };
        let ca = shrink(la);
        let cb = shrink(lb);
        let coarse_bounds = SearchBounds::new(&ca, &cb, cfg, scale)?;
        let coarse = search(&ca, &cb, coarse_bounds.dx, coarse_bounds.dy, coarse_bounds.rows_min)?;
        tracing::trace!(
            "coarse match 1/{}: dx={} dy={} cost={:.2}",
            scale,
            coarse.dx,
            coarse.dy,
            coarse.cost
        );

        let dx = clamp_range(
            coarse.dx * scale - scale..=coarse.dx * scale + scale,
            &full.dx,
        )?;
        let dy = clamp_range(
            coarse.dy * scale - scale..=coarse.dy * scale + scale,
            &full.dy,
        )?;
        search(la, lb, dx, dy, full.rows_min)
    }
}

impl StitchingEngine for OverlapStitcher {
    fn stitch(&mut self, images: &[PixelBuffer]) -> StitchOutput {
        tracing::info!("Stitching {} images...", images.len());
        if images.len() < self.config.min_images.max(1) {
            return StitchOutput::failure(StitchStatus::NeedMoreImages);
        }

        // Inner images take part in two pairs; their planes are built once.
        let sigma = self.config.smoothing_sigma;
        let planes: Vec<LumaImage> = images.par_iter().map(|b| luma_plane(b, sigma)).collect();

        // Placement of every image in panorama coordinates, as translations.
        let mut placements = vec![Matrix3::<f64>::identity()];
        for (i, pair) in planes.windows(2).enumerate() {
            let m = match self.register_pair(&pair[0], &pair[1]) {
                Some(m) if m.cost <= self.config.max_match_cost => m,
                Some(m) => {
                    tracing::debug!(
                        "pair {}-{}: best cost {:.2} exceeds {:.2}",
                        i,
                        i + 1,
                        m.cost,
                        self.config.max_match_cost
                    );
                    return StitchOutput::failure(StitchStatus::HomographyEstimationFailed);
                }
                None => {
                    tracing::debug!("pair {}-{}: no admissible overlap", i, i + 1);
                    return StitchOutput::failure(StitchStatus::HomographyEstimationFailed);
                }
            };
            tracing::debug!(
                "pair {}-{}: dx={} dy={} cost={:.2}",
                i,
                i + 1,
                m.dx,
                m.dy,
                m.cost
            );
            let step = Matrix3::new_translation(&Vector2::new(m.dx as f64, m.dy as f64));
            let last = placements[placements.len() - 1];
            placements.push(last * step);
        }

        let offsets: Vec<[i64; 2]> = placements
            .iter()
            .map(|h| [h[(0, 2)].round() as i64, h[(1, 2)].round() as i64])
            .collect();
        match composite(images, &offsets, &self.config) {
            Some(panorama) => StitchOutput::success(panorama),
            None => StitchOutput::failure(StitchStatus::CameraParameterAdjustmentFailed),
        }
    }
}

/// Admissible translations for one pyramid level.
struct SearchBounds {
    dx: RangeInclusive<i64>,
    dy: RangeInclusive<i64>,
    rows_min: i64,
}

impl SearchBounds {
    fn new(a: &LumaImage, b: &LumaImage, cfg: &StitcherConfig, scale: i64) -> Option<Self> {
        let (wa, ha) = (a.width() as i64, a.height() as i64);
        let (wb, hb) = (b.width() as i64, b.height() as i64);
        let narrow = wa.min(wb);
        let overlap_max = ((cfg.max_overlap_fraction.clamp(0.0, 1.0) * narrow as f32) as i64)
            .min(narrow);
        let overlap_min = (cfg.min_overlap_px as i64 / scale).max(1);
        if overlap_min > overlap_max {
            return None;
        }
        let shift = (cfg.max_vertical_shift_px as i64 + scale - 1) / scale;
        let rows_min =
            ((cfg.min_overlap_rows_fraction.clamp(0.0, 1.0) * ha.min(hb) as f32).ceil() as i64)
                .max(1);
        Some(Self {
            dx: wa - overlap_max..=wa - overlap_min,
            dy: -shift..=shift,
            rows_min,
        })
    }
}

fn clamp_range(
    r: RangeInclusive<i64>,
    bounds: &RangeInclusive<i64>,
) -> Option<RangeInclusive<i64>> {
    let lo = (*r.start()).max(*bounds.start());
    let hi = (*r.end()).min(*bounds.end());
    (lo <= hi).then_some(lo..=hi)
}

/// Exhaustive search over all candidates in parallel; ties keep the
/// earliest candidate (widest overlap, most negative shift).
fn search(
    a: &LumaImage,
    b: &LumaImage,
    dxs: RangeInclusive<i64>,
    dys: RangeInclusive<i64>,
    rows_min: i64,
) -> Option<PairMatch> {
    let candidates: Vec<(i64, i64)> = dxs
        .flat_map(|dx| dys.clone().map(move |dy| (dx, dy)))
        .collect();
    candidates
        .par_iter()
        .enumerate()
        .filter_map(|(i, &(dx, dy))| {
            overlap_cost(a, b, dx, dy, rows_min).map(|cost| (i, PairMatch { dx, dy, cost }))
        })
        .min_by(|(i, p), (j, q)| p.cost.total_cmp(&q.cost).then(i.cmp(j)))
        .map(|(_, m)| m)
}

/// Mean absolute difference where `b`, translated by `(dx, dy)`, overlaps `a`.
fn overlap_cost(a: &LumaImage, b: &LumaImage, dx: i64, dy: i64, rows_min: i64) -> Option<f32> {
    let (wa, ha) = (a.width() as i64, a.height() as i64);
    let (wb, hb) = (b.width() as i64, b.height() as i64);
    let x0 = dx.max(0);
    let x1 = (dx + wb).min(wa);
    let y0 = dy.max(0);
    let y1 = (dy + hb).min(ha);
    if x1 <= x0 || y1 - y0 < rows_min {
        return None;
    }

    let ra = a.as_raw();
    let rb = b.as_raw();
    let mut sum = 0.0f64;
    for y in y0..y1 {
        let row_a = &ra[(y * wa) as usize..((y + 1) * wa) as usize];
        let yb = y - dy;
        let row_b = &rb[(yb * wb) as usize..((yb + 1) * wb) as usize];
        for x in x0..x1 {
            sum += (row_a[x as usize] - row_b[(x - dx) as usize]).abs() as f64;
        }
    }
    let n = ((x1 - x0) * (y1 - y0)) as f64;
    Some((sum / n) as f32)
}

fn rgb_at(buf: &PixelBuffer, x: u32, y: u32) -> [u8; 3] {
    let p = buf.pixel(x, y);
    match buf.channel_order() {
        ChannelOrder::Rgb => p,
        ChannelOrder::Bgr => [p[2], p[1], p[0]],
    }
}

/// Luma plane in 0..255, optionally smoothed.
fn luma_plane(buf: &PixelBuffer, sigma: f32) -> LumaImage {
    let plane = LumaImage::from_fn(buf.width(), buf.height(), |x, y| {
        let [r, g, b] = rgb_at(buf, x, y);
        Luma([0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32])
    });
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&plane, sigma)
    } else {
        plane
    }
}

/// Blend placed images over the strip they all cover. `None` when that strip
/// is too short.
fn composite(
    images: &[PixelBuffer],
    offsets: &[[i64; 2]],
    cfg: &StitcherConfig,
) -> Option<PixelBuffer> {
    let top = offsets.iter().map(|o| o[1]).max()?;
    let bottom = images
        .iter()
        .zip(offsets)
        .map(|(img, o)| o[1] + img.height() as i64)
        .min()?;
    let left = offsets.iter().map(|o| o[0]).min()?;
    let right = images
        .iter()
        .zip(offsets)
        .map(|(img, o)| o[0] + img.width() as i64)
        .max()?;
    let shortest = images.iter().map(|img| img.height()).min()? as f32;

    let height = bottom - top;
    if height <= 0 || (height as f32) < cfg.min_common_height_fraction * shortest {
        tracing::debug!(
            "common strip {}..{} too short for images of height {}",
            top,
            bottom,
            shortest
        );
        return None;
    }
    let width = right - left;
    tracing::debug!("panorama {}x{} from {} images", width, height, images.len());

    let mut data = vec![0u8; (width * height * 3) as usize];
    data.par_chunks_mut((width * 3) as usize)
        .enumerate()
        .for_each(|(row, out)| {
            let gy = top + row as i64;
            for (col, px) in out.chunks_exact_mut(3).enumerate() {
                let gx = left + col as i64;
                let mut acc = [0.0f32; 3];
                let mut wsum = 0.0f32;
                for (img, o) in images.iter().zip(offsets) {
                    let lx = gx - o[0];
                    if lx < 0 || lx >= img.width() as i64 {
                        continue;
                    }
                    // Linear feather: weight is the distance to the nearer
                    // vertical edge of the image.
                    let weight = (lx + 1).min(img.width() as i64 - lx) as f32;
                    let p = rgb_at(img, lx as u32, (gy - o[1]) as u32);
                    for c in 0..3 {
                        acc[c] += weight * p[c] as f32;
                    }
                    wsum += weight;
                }
                if wsum > 0.0 {
                    for c in 0..3 {
                        px[c] = (acc[c] / wsum).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        });

    PixelBuffer::from_raw(width as u32, height as u32, ChannelOrder::Rgb, data).ok()
}
