//! fisheye-pano CLI — stitch a photo sequence and apply a fish-eye lens.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use fisheye_pano::{
    FileImageSource, FileSink, ImageManifest, Interpolation, Orchestrator, OverlapStitcher,
    PipelineConfig, PreviewSheet,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "fisheye-pano")]
#[command(about = "Stitch overlapping photos into a panorama and apply a fish-eye distortion")]
#[command(version)]
struct Cli {
    /// Image ids in left-to-right order (default: image1.jpg .. image7.jpg).
    images: Vec<String>,

    /// Directory relative image ids are resolved against.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory the panorama and the distorted panorama are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Pipeline configuration (JSON). Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Radial coefficient k1.
    #[arg(long, allow_negative_numbers = true)]
    k1: Option<f64>,

    /// Radial coefficient k2.
    #[arg(long, allow_negative_numbers = true)]
    k2: Option<f64>,

    /// Tangential coefficient p1.
    #[arg(long, allow_negative_numbers = true)]
    p1: Option<f64>,

    /// Tangential coefficient p2.
    #[arg(long, allow_negative_numbers = true)]
    p2: Option<f64>,

    /// Focal length x in pixels (default: width / 2).
    #[arg(long)]
    fx: Option<f64>,

    /// Focal length y in pixels (default: height / 2).
    #[arg(long)]
    fy: Option<f64>,

    /// Principal point x in pixels (default: width / 2).
    #[arg(long)]
    cx: Option<f64>,

    /// Principal point y in pixels (default: height / 2).
    #[arg(long)]
    cy: Option<f64>,

    /// Resampling kernel.
    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    /// File name of the stitched panorama.
    #[arg(long)]
    panorama_name: Option<String>,

    /// File name of the distorted panorama.
    #[arg(long)]
    fisheye_name: Option<String>,

    /// Write a preview sheet (originals, panorama, distorted) to this path.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterpolationArg {
    Bilinear,
    Nearest,
}

impl From<InterpolationArg> for Interpolation {
    fn from(value: InterpolationArg) -> Self {
        match value {
            InterpolationArg::Bilinear => Interpolation::Bilinear,
            InterpolationArg::Nearest => Interpolation::Nearest,
        }
    }
}

impl Cli {
    fn manifest(&self) -> ImageManifest {
        if self.images.is_empty() {
            ImageManifest::default()
        } else {
            ImageManifest::new(self.images.iter().cloned())
        }
    }

    fn to_config(&self) -> CliResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        let d = &mut config.lens.distortion;
        if let Some(v) = self.k1 {
            d.k1 = v;
        }
        if let Some(v) = self.k2 {
            d.k2 = v;
        }
        if let Some(v) = self.p1 {
            d.p1 = v;
        }
        if let Some(v) = self.p2 {
            d.p2 = v;
        }
        config.lens.fx = self.fx.or(config.lens.fx);
        config.lens.fy = self.fy.or(config.lens.fy);
        config.lens.cx = self.cx.or(config.lens.cx);
        config.lens.cy = self.cy.or(config.lens.cy);

        if let Some(interp) = self.interpolation {
            config.remap.interpolation = interp.into();
        }
        if let Some(name) = &self.panorama_name {
            config.artifacts.panorama = name.clone();
        }
        if let Some(name) = &self.fisheye_name {
            config.artifacts.distorted = name.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let config = cli.to_config()?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = match &cli.input_dir {
        Some(dir) => FileImageSource::with_root(dir),
        None => FileImageSource::new(),
    };
    let engine = OverlapStitcher::new(config.stitcher.clone());
    let artifacts = config.artifacts.clone();
    let mut orchestrator = Orchestrator::new(cli.manifest(), source, engine, config);

    let mut sink = FileSink::new(&cli.out_dir);
    let mut preview = cli.preview.as_ref().map(PreviewSheet::new);
    let display = preview
        .as_mut()
        .map(|p| p as &mut dyn fisheye_pano::DisplayAdapter);

    let output = orchestrator.run(&mut sink, display)?;

    tracing::info!(
        "Panorama saved to {} ({}x{})",
        sink.path_for(&artifacts.panorama).display(),
        output.panorama.width(),
        output.panorama.height()
    );
    tracing::info!(
        "Fish-eye panorama saved to {}",
        sink.path_for(&artifacts.distorted).display()
    );
    Ok(())
}
