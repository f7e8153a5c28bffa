use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use takeout_exif::pipeline::{Delivered, RunReport};
use takeout_exif::{config, exif, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "takeout-exif",
    version,
    about = "Fold JSON sidecar metadata back into exported photos as EXIF, sorted by year"
)]
struct Cli {
    /// Export directory to reconcile (overrides source_root from the config)
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// Output directory (overrides output_root from the config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Report what would be written without touching the output directory
    #[arg(long)]
    dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    json: bool,

    /// Worker threads for embedding and copying (default: one per core)
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Also copy media files that no sidecar refers to into quarantine
    #[arg(long)]
    quarantine_orphans: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the embedded date, description and GPS of image(s) and exit
    #[arg(long = "show-exif", value_name = "FILE", num_args = 1..)]
    show_exif: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Handle --show-exif
    if !cli.show_exif.is_empty() {
        for path in &cli.show_exif {
            print_embedded(path)?;
        }
        return Ok(());
    }

    // Load config, then apply CLI overrides
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(source) = cli.source {
        config.source_root = source;
    }
    if let Some(output) = cli.output {
        config.output_root = output;
    }
    if let Some(workers) = cli.workers {
        config.output.workers = workers;
    }
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if cli.quarantine_orphans {
        config.output.quarantine_orphans = true;
    }

    log::info!(
        "Reconciling {} into {}",
        config.source_root.display(),
        config.output_root.display()
    );
    if config.output.dry_run {
        log::info!("DRY RUN: nothing will be written");
    }

    let report = pipeline::run(&config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if config.output.dry_run {
        print_plan(&report);
    }

    let s = &report.summary;
    log::info!(
        "Done: {} embedded, {} videos, {} failed, {} unsupported, {} quarantined out of {} sidecars",
        s.embedded,
        s.relocated,
        s.failed(),
        s.unsupported,
        s.quarantined,
        s.sidecars
    );
    if s.orphans > 0 {
        log::info!("{} media file(s) without a sidecar", s.orphans);
    }

    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the planned destination of every record for a dry run.
fn print_plan(report: &RunReport) {
    println!();
    println!("  {BOLD}Planned output:{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(72));

    for record in &report.records {
        let name = record
            .sidecar
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &record.outcome {
            Ok(Delivered::Embedded(dest)) => {
                println!("  {GREEN}{name:<40} → {}{RESET}", dest.display())
            }
            Ok(Delivered::Relocated(dest)) => {
                println!("  {GREEN}{name:<40} → {}{RESET}", dest.display())
            }
            Err(err) => match &record.quarantined {
                Some(q) => println!("  {YELLOW}{name:<40} → {} ({err}){RESET}", q.display()),
                None => println!("  {DIM}{name:<40} : {err}{RESET}"),
            },
        }
    }

    for orphan in &report.orphans {
        println!("  {YELLOW}{:<40} (no sidecar){RESET}", orphan.display());
    }

    println!("  {DIM}{}{RESET}", "─".repeat(72));
    println!();
}

/// Print the metadata embedded in an image.
fn print_embedded(path: &Path) -> Result<()> {
    let data = exif::read_embedded(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let fields: Vec<(&str, Option<&str>)> = vec![
        ("DateTimeOriginal", data.date_time_original.as_deref()),
        ("ImageDescription", data.description.as_deref()),
    ];
    for (tag, val) in &fields {
        if let Some(v) = val {
            print_row(tag, v);
        }
    }

    if data.has_gps {
        if let (Some(r), Some(lat)) = (data.gps_latitude_ref, data.gps_latitude) {
            print_row("GPSLatitude", &format!("{lat:.6} ({r})"));
        }
        if let (Some(r), Some(lon)) = (data.gps_longitude_ref, data.gps_longitude) {
            print_row("GPSLongitude", &format!("{lon:.6} ({r})"));
        }
    }

    if !data.has_gps && fields.iter().all(|(_, v)| v.is_none()) {
        println!("  {DIM}(no EXIF metadata found){RESET}");
    }
    println!();

    Ok(())
}

/// One `tag : value` row of the metadata table.
fn print_row(tag: &str, val: &str) {
    println!("{}", format_row(tag, val));
}

fn format_row(tag: &str, val: &str) -> String {
    format!("  {tag:<22} : {val}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_aligns_values() {
        assert_eq!(
            format_row("GPSLatitude", "40.712800 (N)"),
            "  GPSLatitude            : 40.712800 (N)"
        );
        let long = "a description well past the old wrap width of forty-six characters";
        assert!(format_row("ImageDescription", long).ends_with(long));
    }
}
