use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use traylocate::frame::load_frame;
use traylocate::{LocalizationReport, Localizer, LocatorConfig, RegionMode};

#[derive(Parser)]
#[command(name = "traylocate")]
#[command(about = "Locate and rectify barcode, tray and substrate regions in inspection frames")]
struct Cli {
    /// Input image files
    #[arg(value_name = "IMAGE", required_unless_present = "dump_config")]
    images: Vec<PathBuf>,

    /// JSON configuration file (missing fields take defaults)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Region searches to run after the barcode search
    #[arg(long, value_enum)]
    mode: Option<RegionMode>,

    /// Write rectified regions to this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Keep frames at their native resolution
    #[arg(long)]
    no_resize: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn effective_config(args: &Cli) -> anyhow::Result<LocatorConfig> {
    let mut config = match &args.config {
        Some(path) => LocatorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LocatorConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.no_resize {
        config.frame.resize = false;
    }
    config.validate()?;
    Ok(config)
}

fn write_outputs(dir: &Path, stem: &str, report: &LocalizationReport) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    for (idx, rectified) in report.rectified.iter().enumerate() {
        let path = dir.join(format!("{}_{:02}_{}.png", stem, idx + 1, rectified.role));
        rectified
            .image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(path: &Path, report: &LocalizationReport) {
    println!("\n=== {} ===", path.display());
    let orientation = &report.orientation;
    if orientation.is_found() {
        println!(
            "Barcode: found after {} attempt(s), {} quarter turn(s)",
            orientation.attempts, orientation.quarter_turns
        );
    } else {
        println!("Barcode: not found ({} attempts)", orientation.attempts);
    }

    if let Some(tray) = &report.tray {
        println!(
            "Trays: {} (range {} of {} tried)",
            tray.detections().len(),
            tray.range_index + 1,
            tray.ranges_tried
        );
    }
    if let Some(substrates) = &report.substrates {
        println!(
            "Substrates: {}/{} (range {} of {} tried)",
            substrates.detections().len(),
            substrates.target,
            substrates.range_index + 1,
            substrates.ranges_tried
        );
    }

    for (idx, rectified) in report.rectified.iter().enumerate() {
        let (w, h) = rectified.image.dimensions();
        let how = if rectified.is_warped() { "warped" } else { "unrectified" };
        println!("  {:02} {:<9} {}x{} {}", idx + 1, rectified.role.to_string(), w, h, how);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = effective_config(&args)?;
    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let frames = args
        .images
        .iter()
        .map(|path| {
            load_frame(path, &config.frame)
                .with_context(|| format!("Failed to load image {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut localizer = Localizer::new(config)?;
    if let Some(debug_dir) = args.debug_out.clone() {
        localizer = localizer.with_debug(debug_dir)?;
    }

    let reports = if frames.len() == 1 {
        vec![localizer.localize(&frames[0])]
    } else {
        localizer.localize_batch(&frames)
    };

    let mut failures = 0;
    for (path, report) in args.images.iter().zip(reports) {
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                warn!("{}: {}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        print_summary(path, &report);
        if let Some(dir) = &args.output {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame".to_string());
            write_outputs(dir, &stem, &report)?;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} frame(s) failed", failures, args.images.len());
    }
    Ok(())
}
