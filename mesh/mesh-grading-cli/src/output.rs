//! Output helpers shared by the text and JSON modes.

use colored::Colorize;
use mesh_grading::{GradingReport, Landmarks};
use serde::Serialize;

use crate::OutputFormat;

/// Print an informational line (text mode only).
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "→".blue(), message);
}

/// Print a success line (text mode only).
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a value as pretty JSON (JSON mode only).
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Text) {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
    }
}

fn point(p: &mesh_types::Point3<f64>) -> String {
    format!("({:.2}, {:.2}, {:.2})", p.x, p.y, p.z)
}

fn landmark_line(name: &str, position: &mesh_types::Point3<f64>, gamma: f64, explicit: bool) {
    let source = if explicit {
        "given".to_string()
    } else {
        format!("estimated, gamma {gamma}")
    };
    println!("  {}: {} ({})", name.cyan(), point(position), source);
}

/// Print the resolved landmarks.
pub fn landmarks(landmarks: &Landmarks) {
    landmark_line(
        "Left ear",
        &landmarks.left,
        landmarks.left_gamma,
        landmarks.left_explicit,
    );
    landmark_line(
        "Right ear",
        &landmarks.right,
        landmarks.right_gamma,
        landmarks.right_explicit,
    );
}

/// Print a grading report in text form.
pub fn report(report: &GradingReport, verbose: bool) {
    println!(
        "  {}: {} → {}",
        "Vertices".cyan(),
        report.original_vertices,
        report.final_vertices
    );
    println!(
        "  {}: {} → {} ({:.2}x)",
        "Faces".cyan(),
        report.original_faces,
        report.final_faces,
        report.face_ratio()
    );
    println!(
        "  {}: {:.3} → {:.3} mm average ({:.3}-{:.3})",
        "Edges".cyan(),
        report.original_edge_stats.avg_length,
        report.final_edge_stats.avg_length,
        report.final_edge_stats.min_length,
        report.final_edge_stats.max_length
    );

    if !verbose {
        return;
    }

    println!(
        "  {}: {}, side {}",
        "Sizing".cyan(),
        report.mode,
        report.side
    );
    println!(
        "  {}: {} mm error, {} mm normalization",
        "Parameters".cyan(),
        report.error_tolerance,
        report.normalization
    );
    landmarks(&report.landmarks);

    let totals = report.totals();
    println!(
        "  {}: {} splits, {} collapses, {} flips, {} rejected, {} caps removed",
        "Operations".cyan(),
        totals.splits,
        totals.collapses,
        totals.flips,
        totals.rejected,
        report.caps_removed
    );
    for (i, pass) in report.iterations.iter().enumerate() {
        println!(
            "    pass {:>2}: {:>6} splits {:>6} collapses {:>6} flips {:>6} projected",
            i + 1,
            pass.splits,
            pass.collapses,
            pass.flips,
            pass.projected
        );
    }
    if report.converged_early {
        println!("  {}", "Converged before the iteration limit".dimmed());
    }
    if report.low_confidence_vertices > 0 {
        println!(
            "  {}: {} vertices without curvature estimate",
            "Warning".yellow(),
            report.low_confidence_vertices
        );
    }
    if totals.projection_misses > 0 {
        println!(
            "  {}: {} projection misses",
            "Warning".yellow(),
            totals.projection_misses
        );
    }
}
