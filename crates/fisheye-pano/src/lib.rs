//! fisheye-pano — panorama stitching followed by a synthetic fish-eye lens.
//!
//! The pipeline stages are:
//!
//! 1. **Loading** – read every resource of an [`ImageManifest`] through an
//!    [`ImageSource`] into canonical RGB [`PixelBuffer`]s.
//! 2. **Stitching** – hand the ordered images to a [`StitchingEngine`] and
//!    interpret its [`StitchStatus`].
//! 3. **Distorting** – build a dense [`CoordinateMap`] from a Brown–Conrady
//!    lens model and resample the panorama through it.
//! 4. **Finalizing** – save both buffers through an [`ArtifactSink`] and,
//!    optionally, present them with a [`DisplayAdapter`].
//!
//! [`Orchestrator`] drives the stages and records the visited
//! [`PipelineState`]s; any failure aborts with a [`PipelineFailure`] naming
//! the stage and the [`PanoError`].

mod buffer;
mod config;
mod error;
pub mod lens;
mod output;
mod pipeline;
mod remap;
mod source;
pub mod stitch;

#[cfg(test)]
pub(crate) mod test_utils;

pub use buffer::{ChannelOrder, PixelBuffer};
pub use config::PipelineConfig;
pub use error::PanoError;
pub use lens::{build_map, CoordinateMap, LensConfig, LensModel, RadialTangentialDistortion};
pub use output::{ArtifactNames, ArtifactSink, DisplayAdapter, FileSink, MemorySink, PreviewSheet};
pub use pipeline::{Orchestrator, PipelineFailure, PipelineOutput, PipelineState, Stage};
pub use remap::{
    resample, resample_with, sample_bilinear, sample_nearest, Interpolation, RemapConfig,
};
pub use source::{FileImageSource, ImageManifest, ImageSource, MemoryImageSource};
pub use stitch::{OverlapStitcher, StitchOutput, StitchStatus, StitcherConfig, StitchingEngine};
