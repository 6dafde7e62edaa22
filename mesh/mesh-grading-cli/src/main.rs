//! hrtf-mesh-grading: adaptive remeshing of head meshes for HRTF simulation.
//!
//! Grades a head mesh so triangles are small around the simulated ear and
//! large elsewhere, and writes the result for the boundary element solver.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_grading=info` - Summary of each run
//! - `RUST_LOG=mesh_grading=debug` - Per-pass progress
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Grade towards the left ear between 1 and 10 mm
//! hrtf-mesh-grading -x 1 -y 10 -e 0.5 -z left -i head.ply -o head_left.ply
//!
//! # Distance-based grading with explicit ear canal entrance
//! hrtf-mesh-grading -x 1 -y 10 -z left --mode distance \
//!     --left-ear -72,0,0 --normalization 20 -i head.stl -o graded.stl -v
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use mesh_grading::{grade, EarSide, GradingConfig, GradingReport, SizingStrategy};
use mesh_types::Point3;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod output;

/// hrtf-mesh-grading - Adaptive mesh grading for HRTF simulation.
///
/// Remeshes a head so edge lengths follow a sizing field driven by
/// curvature and the distance to the chosen ear.
#[derive(Parser)]
#[command(name = "hrtf-mesh-grading")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Minimum edge length in mm
    #[arg(short = 'x', long = "min-length", required_unless_present = "config")]
    min_length: Option<f64>,

    /// Maximum edge length in mm
    #[arg(short = 'y', long = "max-length", required_unless_present = "config")]
    max_length: Option<f64>,

    /// Maximum chordal error in mm (defaults to the minimum length)
    #[arg(short = 'e', long = "error")]
    error_tolerance: Option<f64>,

    /// Ear to refine around: left, right or none
    #[arg(short = 'z', long = "side")]
    side: Option<EarSide>,

    /// Input mesh (.stl, .ply, .obj)
    #[arg(short, long)]
    input: PathBuf,

    /// Output mesh (.stl, .ply, .obj)
    #[arg(short, long)]
    output: PathBuf,

    /// Sizing strategy: hybrid or distance
    #[arg(long)]
    mode: Option<SizingStrategy>,

    /// Distance in mm over which sizing reaches the maximum length
    #[arg(long)]
    normalization: Option<f64>,

    /// Number of remeshing passes
    #[arg(long)]
    iterations: Option<u32>,

    /// Do not project vertices back onto the input surface
    #[arg(long)]
    no_projection: bool,

    /// Left ear canal entrance as X,Y,Z
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    left_ear: Option<Point3<f64>>,

    /// Right ear canal entrance as X,Y,Z
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    right_ear: Option<Point3<f64>>,

    /// Gamma factor for estimating the left ear from the head width
    #[arg(long)]
    left_gamma: Option<f64>,

    /// Gamma factor for estimating the right ear from the head width
    #[arg(long)]
    right_gamma: Option<f64>,

    /// Dihedral angle in degrees above which edges are kept as features
    #[arg(long)]
    feature_angle: Option<f64>,

    /// JSON grading configuration; explicit flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write ASCII instead of binary (STL, PLY)
    #[arg(long)]
    ascii: bool,

    /// Output format for results
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Increase output verbosity (-v for details, -vv for debug logs)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize)]
struct GradeResult<'a> {
    input: String,
    output: String,
    success: bool,
    config: &'a GradingConfig,
    report: &'a GradingReport,
}

/// Parse `X,Y,Z` into a point.
fn parse_point(s: &str) -> Result<Point3<f64>, String> {
    let coords: Vec<f64> = s
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match coords.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected X,Y,Z, got '{s}'")),
    }
}

/// Load the base configuration and apply the command-line overrides.
fn build_config(cli: &Cli) -> Result<GradingConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid grading config in {}", path.display()))?
        }
        None => GradingConfig::default(),
    };

    if let Some(min) = cli.min_length {
        config.min_length = min;
    }
    if let Some(max) = cli.max_length {
        config.max_length = max;
    }
    if cli.error_tolerance.is_some() {
        config.error_tolerance = cli.error_tolerance;
    }
    if let Some(side) = cli.side {
        config.side = side;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(normalization) = cli.normalization {
        config.distance_normalization = normalization;
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if cli.no_projection {
        config.project_to_original = false;
    }
    if cli.left_ear.is_some() {
        config.landmarks.left = cli.left_ear;
    }
    if cli.right_ear.is_some() {
        config.landmarks.right = cli.right_ear;
    }
    if cli.left_gamma.is_some() {
        config.landmarks.left_gamma = cli.left_gamma;
    }
    if cli.right_gamma.is_some() {
        config.landmarks.right_gamma = cli.right_gamma;
    }
    if cli.feature_angle.is_some() {
        config.feature_angle = cli.feature_angle;
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    if mesh_io::MeshFormat::from_path(&cli.output).is_none() {
        bail!(
            "Unsupported output format for {} (use .stl, .ply or .obj)",
            cli.output.display()
        );
    }
    let config = build_config(cli)?;
    debug!("Grading config: {:?}", config);

    let mut mesh = mesh_io::load_mesh(&cli.input)
        .with_context(|| format!("Failed to load mesh from {}", cli.input.display()))?;

    output::info(
        &format!(
            "Grading {} ({} vertices, {} faces)...",
            display_name(&cli.input),
            mesh.vertices.len(),
            mesh.faces.len()
        ),
        cli.format,
        cli.quiet,
    );

    let report = grade(&mut mesh, &config)
        .with_context(|| format!("Failed to grade {}", cli.input.display()))?;

    mesh_io::save_mesh_with(&mesh, &cli.output, !cli.ascii)
        .with_context(|| format!("Failed to save graded mesh to {}", cli.output.display()))?;

    match cli.format {
        OutputFormat::Json => {
            let result = GradeResult {
                input: cli.input.display().to_string(),
                output: cli.output.display().to_string(),
                success: true,
                config: &config,
                report: &report,
            };
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Graded mesh saved to {}", cli.output.display()),
                    cli.format,
                    cli.quiet,
                );
                output::report(&report, cli.verbose > 0);
            }
        }
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over the -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 | 1 => "warn",
            2 => "mesh_grading=debug,mesh_io=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        if !cli.quiet {
            eprintln!("{}: {}", "Error".red().bold(), e);
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {}", "Caused by".yellow(), cause);
            }
        }
        std::process::exit(1);
    }
}
