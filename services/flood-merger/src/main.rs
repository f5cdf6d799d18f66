//! Flood depth merger.
//!
//! Fetches JRC flood depth tiles, builds one flood-depth raster per event,
//! filters event rasters by region and composes the global maximum-depth
//! raster.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flood_pipeline::{CompositeOutcome, Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "flood-merger")]
#[command(about = "Per-event flood depth mosaics and global maximum-depth composite")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "FLOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch tiles missing from the tile tree, one directory per year
    Download {
        /// Root of the tile tree
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First year to fetch
        #[arg(long)]
        first_year: Option<i32>,

        /// Last year to fetch (inclusive)
        #[arg(long)]
        last_year: Option<i32>,
    },

    /// Merge the tiles of every event into one raster per event
    Events {
        /// Root of the tile tree
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for event rasters
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Events processed in parallel
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Copy event rasters touching a configured region forward
    Filter {
        /// Directory of event rasters
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Destination directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose all event rasters into the global maximum-depth raster
    Composite {
        /// Directory of event rasters; the composite is written there too
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run events, filter and composite in order
    All {
        /// Root of the tile tree
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Fetch missing tiles first
        #[arg(long)]
        download: bool,

        /// Events processed in parallel
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

impl Command {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut PipelineConfig) {
        match self {
            Command::Download {
                output,
                first_year,
                last_year,
            } => {
                if let Some(dir) = output {
                    config.input_dir = dir.clone();
                }
                if let Some(year) = first_year {
                    config.download.first_year = *year;
                }
                if let Some(year) = last_year {
                    config.download.last_year = *year;
                }
            }
            Command::Events {
                input,
                output,
                workers,
            } => {
                if let Some(dir) = input {
                    config.input_dir = dir.clone();
                }
                if let Some(dir) = output {
                    config.events_dir = dir.clone();
                }
                if let Some(n) = workers {
                    config.workers = *n;
                }
            }
            Command::Filter { input, output } => {
                if let Some(dir) = input {
                    config.events_dir = dir.clone();
                }
                if let Some(dir) = output {
                    config.composite_dir = dir.clone();
                }
            }
            Command::Composite { input } => {
                if let Some(dir) = input {
                    config.composite_dir = dir.clone();
                }
            }
            Command::All { input, workers, .. } => {
                if let Some(dir) = input {
                    config.input_dir = dir.clone();
                }
                if let Some(n) = workers {
                    config.workers = *n;
                }
            }
        }
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid FLOOD_* environment override")?;
    args.command.apply(&mut config);
    Ok(config)
}

fn run_download(pipeline: &Pipeline) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let report = runtime.block_on(pipeline.run_download()).with_context(|| {
        format!(
            "Download stage failed for {}",
            pipeline.config().input_dir.display()
        )
    })?;

    for (year, error) in &report.failed_years {
        warn!(year, error = %error, "Year not downloaded");
    }
    for (url, error) in &report.failed {
        warn!(url = %url, error = %error, "Tile not downloaded");
    }
    Ok(())
}

fn run_events(pipeline: &Pipeline) -> Result<()> {
    let summary = pipeline.run_events().with_context(|| {
        format!(
            "Event stage failed for {}",
            pipeline.config().input_dir.display()
        )
    })?;
    if summary.has_failures() {
        warn!(failed = summary.failed.len(), "Some events could not be merged");
    }
    Ok(())
}

fn run_filter(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.run_filter().context("Boundary filter failed")?;
    for (path, error) in &report.failed {
        warn!(path = %path.display(), error = %error, "Event raster not filtered");
    }
    Ok(())
}

fn run_composite(pipeline: &Pipeline) -> Result<()> {
    let outcome = pipeline.run_composite().with_context(|| {
        format!(
            "Composite stage failed for {}",
            pipeline.config().composite_dir.display()
        )
    })?;

    match outcome {
        CompositeOutcome::Persisted {
            path,
            events,
            width,
            height,
            skipped,
        } => info!(
            path = %path.display(),
            events,
            width,
            height,
            skipped = skipped.len(),
            "Global composite ready"
        ),
        CompositeOutcome::Skipped { path } => {
            info!(path = %path.display(), "Global composite already present")
        }
        CompositeOutcome::NoInputs { skipped } => {
            warn!(skipped = skipped.len(), "No event rasters to compose")
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json)?;

    info!("Starting flood merger");

    let config = load_config(&args)?;
    info!(
        input = %config.input_dir.display(),
        events = %config.events_dir.display(),
        composite = %config.composite_dir.display(),
        output_crs = %config.output_crs,
        "Loaded configuration"
    );
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    match &args.command {
        Command::Download { .. } => run_download(&pipeline)?,
        Command::Events { .. } => run_events(&pipeline)?,
        Command::Filter { .. } => run_filter(&pipeline)?,
        Command::Composite { .. } => run_composite(&pipeline)?,
        Command::All { download, .. } => {
            if *download {
                run_download(&pipeline)?;
            }
            run_events(&pipeline)?;
            if pipeline.config().regions.is_empty() {
                // Compose every event raster in place
                warn!("No regions configured, skipping boundary filter");
                let mut config = pipeline.config().clone();
                config.composite_dir = config.events_dir.clone();
                run_composite(&Pipeline::new(config)?)?;
            } else {
                run_filter(&pipeline)?;
                run_composite(&pipeline)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_overrides() {
        let args = Args::try_parse_from([
            "flood-merger",
            "--log-level",
            "debug",
            "events",
            "--input",
            "/data/tiles",
            "--output",
            "/data/events",
            "--workers",
            "4",
        ])
        .unwrap();

        let mut config = PipelineConfig::default();
        args.command.apply(&mut config);
        assert_eq!(config.input_dir, PathBuf::from("/data/tiles"));
        assert_eq!(config.events_dir, PathBuf::from("/data/events"));
        assert_eq!(config.workers, 4);
        assert_eq!(args.log_level, "debug");
        assert!(!args.json);
    }

    #[test]
    fn test_filter_overrides() {
        let args = Args::try_parse_from(["flood-merger", "filter", "-i", "in", "-o", "out"]).unwrap();
        let mut config = PipelineConfig::default();
        args.command.apply(&mut config);
        assert_eq!(config.events_dir, PathBuf::from("in"));
        assert_eq!(config.composite_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_composite_keeps_defaults_without_flags() {
        let args = Args::try_parse_from(["flood-merger", "--json", "composite"]).unwrap();
        let mut config = PipelineConfig::default();
        args.command.apply(&mut config);
        assert_eq!(config.composite_dir, PathBuf::from("data/events_filtered"));
        assert!(args.json);
    }

    #[test]
    fn test_download_overrides() {
        let args = Args::try_parse_from([
            "flood-merger",
            "download",
            "--output",
            "/data/jrc",
            "--first-year",
            "2019",
            "--last-year",
            "2021",
        ])
        .unwrap();
        let mut config = PipelineConfig::default();
        args.command.apply(&mut config);
        assert_eq!(config.input_dir, PathBuf::from("/data/jrc"));
        assert_eq!(config.download.years(), 2019..=2021);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_all_download_flag() {
        let args = Args::try_parse_from(["flood-merger", "all", "--download", "-w", "2"]).unwrap();
        match &args.command {
            Command::All { download, workers, .. } => {
                assert!(*download);
                assert_eq!(*workers, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["flood-merger"]).is_err());
    }
}
