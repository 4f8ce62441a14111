//! Image acquisition: the manifest of resources and the loaders that read them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::ImageReader;

use crate::buffer::PixelBuffer;
use crate::error::PanoError;

const DEFAULT_IMAGE_COUNT: usize = 7;

/// Ordered list of resource identifiers to stitch.
///
/// The order feeds both the stitching engine and the originals row of the
/// preview, so it is preserved exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageManifest {
    entries: Vec<String>,
}

impl ImageManifest {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ImageManifest {
    /// `image1.jpg` through `image7.jpg`.
    fn default() -> Self {
        Self::new((1..=DEFAULT_IMAGE_COUNT).map(|i| format!("image{i}.jpg")))
    }
}

/// Reads one named resource into a canonical-order pixel buffer.
pub trait ImageSource {
    /// Load `resource`, failing with [`PanoError::ResourceNotFound`] when it
    /// is missing or cannot be decoded.
    fn load(&mut self, resource: &str) -> Result<PixelBuffer, PanoError>;
}

/// Decodes images from the filesystem.
///
/// Relative resource ids are resolved against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    root: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, resource: &str) -> PathBuf {
        let path = Path::new(resource);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageSource for FileImageSource {
    fn load(&mut self, resource: &str) -> Result<PixelBuffer, PanoError> {
        let path = self.resolve(resource);
        tracing::info!("Reading image: {}", path.display());
        let img = ImageReader::open(&path)
            .map_err(|e| PanoError::not_found(resource, e))?
            .with_guessed_format()
            .map_err(|e| PanoError::not_found(resource, e))?
            .decode()
            .map_err(|e| PanoError::not_found(resource, e))?;
        let rgb = img.into_rgb8();
        tracing::debug!("{}: {}x{}", resource, rgb.width(), rgb.height());
        PixelBuffer::from_rgb_image(rgb).map_err(|e| PanoError::not_found(resource, e))
    }
}

/// In-memory loader keyed by resource id.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, PixelBuffer>,
    loads: usize,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: impl Into<String>, buffer: PixelBuffer) {
        self.images.insert(resource.into(), buffer);
    }

    /// Number of `load` calls made so far, successful or not.
    pub fn load_count(&self) -> usize {
        self.loads
    }
}

impl ImageSource for MemoryImageSource {
    fn load(&mut self, resource: &str) -> Result<PixelBuffer, PanoError> {
        self.loads += 1;
        self.images
            .get(resource)
            .cloned()
            .map(PixelBuffer::to_canonical)
            .ok_or_else(|| PanoError::not_found(resource, "no such resource"))
    }
}
