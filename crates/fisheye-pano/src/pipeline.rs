//! Stage sequencing: load, stitch, distort, persist.

use std::fmt;

use crate::buffer::PixelBuffer;
use crate::config::PipelineConfig;
use crate::error::PanoError;
use crate::lens::build_map;
use crate::output::{ArtifactSink, DisplayAdapter};
use crate::remap::resample_with;
use crate::source::{ImageManifest, ImageSource};
use crate::stitch::StitchingEngine;

/// Pipeline stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Loading,
    Stitching,
    Distorting,
    Finalizing,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Stitching => "stitching",
            Self::Distorting => "distorting",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orchestrator state. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Loading,
    Stitching,
    Distorting,
    Finalizing,
    Done,
    Failed(PanoError),
}

impl From<Stage> for PipelineState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Loading => Self::Loading,
            Stage::Stitching => Self::Stitching,
            Stage::Distorting => Self::Distorting,
            Stage::Finalizing => Self::Finalizing,
        }
    }
}

/// Error returned by [`Orchestrator::run`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: PanoError,
}

/// Buffers produced by a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub panorama: PixelBuffer,
    pub distorted: PixelBuffer,
}

/// Drives one image manifest through the stages.
///
/// The orchestrator owns its loader and engine; sink and display are
/// borrowed per run. Every call to [`run`](Self::run) starts from `Idle`.
pub struct Orchestrator<S, E> {
    manifest: ImageManifest,
    source: S,
    engine: E,
    config: PipelineConfig,
    history: Vec<PipelineState>,
}

impl<S: ImageSource, E: StitchingEngine> Orchestrator<S, E> {
    pub fn new(manifest: ImageManifest, source: S, engine: E, config: PipelineConfig) -> Self {
        Self {
            manifest,
            source,
            engine,
            config,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn manifest(&self) -> &ImageManifest {
        &self.manifest
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Current state.
    pub fn state(&self) -> &PipelineState {
        // `history` always starts with `Idle`.
        self.history.last().unwrap_or(&PipelineState::Idle)
    }

    /// States visited by the last run, starting with `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run the full pipeline once.
    ///
    /// On success both artifacts have been saved and, if attached, the
    /// display adapter has been called.
    pub fn run(
        &mut self,
        sink: &mut dyn ArtifactSink,
        display: Option<&mut dyn DisplayAdapter>,
    ) -> Result<PipelineOutput, PipelineFailure> {
        self.history.clear();
        self.history.push(PipelineState::Idle);

        match self.run_stages(sink, display) {
            Ok(output) => {
                self.transition(PipelineState::Done);
                Ok(output)
            }
            Err(failure) => {
                // Reporting the failure is left to the caller.
                tracing::debug!("{failure}");
                self.transition(PipelineState::Failed(failure.error.clone()));
                Err(failure)
            }
        }
    }

    fn run_stages(
        &mut self,
        sink: &mut dyn ArtifactSink,
        display: Option<&mut dyn DisplayAdapter>,
    ) -> Result<PipelineOutput, PipelineFailure> {
        if self.manifest.is_empty() {
            return Err(fail(Stage::Loading, PanoError::EmptyManifest));
        }

        self.enter(Stage::Loading);
        let originals = self.load_all()?;

        self.enter(Stage::Stitching);
        let panorama = self
            .engine
            .stitch(&originals)
            .into_result()
            .map_err(|e| fail(Stage::Stitching, e))?;
        tracing::debug!("panorama {}x{}", panorama.width(), panorama.height());

        self.enter(Stage::Distorting);
        let distorted = self.distort(&panorama)?;

        self.enter(Stage::Finalizing);
        let names = &self.config.artifacts;
        sink.save(&panorama, &names.panorama)
            .map_err(|e| fail(Stage::Finalizing, e))?;
        sink.save(&distorted, &names.distorted)
            .map_err(|e| fail(Stage::Finalizing, e))?;
        if let Some(display) = display {
            display.show(&originals, &panorama, &distorted);
        }

        Ok(PipelineOutput {
            panorama,
            distorted,
        })
    }

    fn load_all(&mut self) -> Result<Vec<PixelBuffer>, PipelineFailure> {
        let mut images = Vec::with_capacity(self.manifest.len());
        for resource in self.manifest.entries() {
            let image = self
                .source
                .load(resource)
                .map_err(|e| fail(Stage::Loading, e))?;
            images.push(image.to_canonical());
        }
        Ok(images)
    }

    fn distort(&self, panorama: &PixelBuffer) -> Result<PixelBuffer, PipelineFailure> {
        tracing::info!("Applying fish-eye effect...");
        let map = build_map(panorama.width(), panorama.height(), &self.config.lens)
            .map_err(|e| fail(Stage::Distorting, e))?;
        resample_with(panorama, &map, &self.config.remap).map_err(|e| fail(Stage::Distorting, e))
    }

    fn enter(&mut self, stage: Stage) {
        self.transition(stage.into());
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!("pipeline: {:?} -> {:?}", self.state(), next);
        self.history.push(next);
    }
}

fn fail(stage: Stage, error: PanoError) -> PipelineFailure {
    PipelineFailure { stage, error }
}
