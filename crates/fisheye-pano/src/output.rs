//! Persistence and display adapters at the end of the pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::PanoError;

/// File names of the two artifacts written on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub panorama: String,
    pub distorted: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            panorama: "panorama.jpg".to_string(),
            distorted: "fisheye_panorama.jpg".to_string(),
        }
    }
}

/// Persists a finished buffer under a name.
pub trait ArtifactSink {
    fn save(&mut self, buffer: &PixelBuffer, name: &str) -> Result<(), PanoError>;
}

/// Writes artifacts into a directory, encoding by file extension.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact called `name` is written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl ArtifactSink for FileSink {
    fn save(&mut self, buffer: &PixelBuffer, name: &str) -> Result<(), PanoError> {
        let path = self.path_for(name);
        ensure_parent_dir(&path)?;
        buffer
            .to_rgb_image()
            .save(&path)
            .map_err(|e| PanoError::io(&path, e))?;
        tracing::info!("Saved {} ({}x{})", path.display(), buffer.width(), buffer.height());
        Ok(())
    }
}

/// Keeps saved buffers in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    saved: BTreeMap<String, PixelBuffer>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PixelBuffer> {
        self.saved.get(name)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn save(&mut self, buffer: &PixelBuffer, name: &str) -> Result<(), PanoError> {
        self.saved.insert(name.to_string(), buffer.clone());
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), PanoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PanoError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Presents the originals, the panorama and the distorted panorama.
///
/// Purely presentational: nothing downstream depends on the outcome.
pub trait DisplayAdapter {
    fn show(&mut self, originals: &[PixelBuffer], panorama: &PixelBuffer, distorted: &PixelBuffer);
}

/// Renders a three-row sheet (originals side by side, panorama, distorted
/// panorama) and writes it to an image file.
#[derive(Debug, Clone)]
pub struct PreviewSheet {
    path: PathBuf,
    width: u32,
    gap: u32,
    background: [u8; 3],
}

impl PreviewSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            width: 1600,
            gap: 8,
            background: [32, 32, 32],
        }
    }

    /// Sheet width in pixels; each row is scaled to fit it.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compose the sheet without writing it.
    pub fn render(
        &self,
        originals: &[PixelBuffer],
        panorama: &PixelBuffer,
        distorted: &PixelBuffer,
    ) -> RgbImage {
        let inner = self.width.saturating_sub(2 * self.gap).max(1);
        let rows = [
            originals_row(originals, inner, self.gap),
            fit_width(&panorama.to_rgb_image(), inner),
            fit_width(&distorted.to_rgb_image(), inner),
        ];

        let gaps = self.gap * (rows.len() as u32 + 1);
        let height = rows.iter().map(|r| r.height()).sum::<u32>() + gaps;
        let mut sheet = RgbImage::from_pixel(self.width, height, Rgb(self.background));
        let mut y = self.gap;
        for row in rows.iter() {
            let x = self.width.saturating_sub(row.width()) / 2;
            imageops::overlay(&mut sheet, row, x as i64, y as i64);
            y += row.height() + self.gap;
        }
        sheet
    }
}

impl DisplayAdapter for PreviewSheet {
    fn show(&mut self, originals: &[PixelBuffer], panorama: &PixelBuffer, distorted: &PixelBuffer) {
        let sheet = self.render(originals, panorama, distorted);
        if let Err(e) = ensure_parent_dir(&self.path) {
            tracing::warn!("preview not written: {e}");
            return;
        }
        match sheet.save(&self.path) {
            Ok(()) => tracing::info!("Preview written to {}", self.path.display()),
            Err(e) => tracing::warn!("preview not written to {}: {e}", self.path.display()),
        }
    }
}

/// Scale to `width`, keeping aspect ratio; never shorter than one pixel.
fn fit_width(img: &RgbImage, width: u32) -> RgbImage {
    let h = ((img.height() as f64 * width as f64 / img.width() as f64).round() as u32).max(1);
    imageops::resize(img, width, h, FilterType::Triangle)
}

/// Originals scaled to a common height so that, side by side with `gap`
/// between them, they span `width`.
fn originals_row(originals: &[PixelBuffer], width: u32, gap: u32) -> RgbImage {
    if originals.is_empty() {
        return RgbImage::new(width, 1);
    }
    let images: Vec<RgbImage> = originals.iter().map(PixelBuffer::to_rgb_image).collect();
    let gaps = gap * (images.len() as u32 - 1);
    let available = width.saturating_sub(gaps).max(images.len() as u32) as f64;
    // Sum of aspect ratios at unit height.
    let aspect_sum: f64 = images
        .iter()
        .map(|i| i.width() as f64 / i.height() as f64)
        .sum();
    let h = ((available / aspect_sum).floor() as u32).max(1);

    let scaled: Vec<RgbImage> = images
        .iter()
        .map(|i| {
            let w = ((i.width() as f64 * h as f64 / i.height() as f64).floor() as u32).max(1);
            imageops::resize(i, w, h, FilterType::Triangle)
        })
        .collect();
    let total = scaled.iter().map(|i| i.width()).sum::<u32>() + gaps;
    let mut row = RgbImage::new(total, h);
    let mut x = 0i64;
    for img in &scaled {
        imageops::overlay(&mut row, img, x, 0);
        x += (img.width() + gap) as i64;
    }
    // One-pixel minimums can still overflow with very many originals.
    if row.width() > width {
        fit_width(&row, width)
    } else {
        row
    }
}
