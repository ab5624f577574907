//! nivis CLI — Landsat snow & surface-temperature pipeline
//!
//! One subcommand per pipeline stage. Every stage is idempotent and
//! resumable: scenes already processed according to the tag store are
//! skipped, per-scene failures are reported and the batch continues. The
//! process exits nonzero when any scene failed; the details go to the
//! stage report on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use nivis_pipeline::stage::{
    run_binary, run_catalog, run_clip, run_ndsi, run_snow_stats, run_temperature_image,
    run_temperature_stats, run_true_color, StageReport,
};
use nivis_pipeline::tags::JsonTagStore;
use nivis_pipeline::Config;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "nivis")]
#[command(author, version, about = "Landsat snow & surface-temperature time series", long_about = None)]
struct Cli {
    /// Pipeline configuration file (YAML); defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the scene catalog and report from the raw archive
    Catalog,
    /// Clip all catalogued bands to the ROI grid
    Clip,
    /// Compute the NDSI raster per scene
    Ndsi,
    /// Compute the binary snow mask per scene
    Binary,
    /// Compose the true-color image per scene
    TrueColor,
    /// Compute the surface-temperature raster per scene
    TemperatureImage,
    /// Compute the mean ROI temperature per scene
    TemperatureStats,
    /// Compute the snow-cover percentage per scene
    SnowStats,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn finish(report: StageReport) -> Result<()> {
    print!("{report}");
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    // The catalog stage has no tag-store involvement; everything else
    // opens the shared document up front so a corrupt store aborts before
    // any scene is touched.
    if let Commands::Catalog = cli.command {
        let pb = spinner("Building scene catalog...");
        let report = run_catalog(&config).context("catalog stage failed")?;
        pb.finish_and_clear();
        info!(report = %config.report_file().display(), "catalog report written");
        return finish(report);
    }

    let mut store =
        JsonTagStore::open(config.tags_file()).context("failed to open the tag store")?;

    let (name, result) = match cli.command {
        Commands::Catalog => unreachable!("handled above"),
        Commands::Clip => ("clip", run_clip(&config, &mut store)),
        Commands::Ndsi => ("ndsi", run_ndsi(&config, &mut store)),
        Commands::Binary => ("binary", run_binary(&config, &mut store)),
        Commands::TrueColor => ("true-color", run_true_color(&config, &mut store)),
        Commands::TemperatureImage => {
            ("temperature-image", run_temperature_image(&config, &mut store))
        }
        Commands::TemperatureStats => {
            ("temperature-stats", run_temperature_stats(&config, &mut store))
        }
        Commands::SnowStats => ("snow-stats", run_snow_stats(&config, &mut store)),
    };

    let report = result.with_context(|| format!("{name} stage failed"))?;
    finish(report)
}
