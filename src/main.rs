use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use places_scraper::config::{AppConfig, RawConfig};
use places_scraper::gateway::PlacesGateway;
use places_scraper::logging;
use places_scraper::pipeline::{Pipeline, ProcessingSummary};
use places_scraper::storage::create_sink;

#[derive(Parser)]
#[command(name = "places_scraper")]
#[command(about = "Collect nearby businesses from the Google Places API")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, validate and store businesses around one location
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Resolve and validate configuration without calling the API
    CheckConfig {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line values that take precedence over the file and the environment
#[derive(Args, Debug)]
struct Overrides {
    #[arg(long, allow_negative_numbers = true)]
    latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    longitude: Option<f64>,
    /// Search radius in meters
    #[arg(long)]
    radius: Option<u32>,
    /// Place type filter, e.g. restaurant
    #[arg(long)]
    business_type: Option<String>,
    /// Payload feeding the transformer: details or nearby
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Storage kind: csv, jsonl or memory
    #[arg(long)]
    storage: Option<String>,
    /// Output file for file-backed storage
    #[arg(long)]
    output: Option<String>,
}

impl Overrides {
    fn apply(self, raw: &mut RawConfig) {
        if self.latitude.is_some() {
            raw.search.latitude = self.latitude;
        }
        if self.longitude.is_some() {
            raw.search.longitude = self.longitude;
        }
        if self.radius.is_some() {
            raw.search.radius_meters = self.radius;
        }
        if self.business_type.is_some() {
            raw.search.business_type = self.business_type;
        }
        if self.source.is_some() {
            raw.pipeline.source = self.source;
        }
        if self.batch_size.is_some() {
            raw.pipeline.batch_size = self.batch_size;
        }
        if self.storage.is_some() {
            raw.storage.kind = self.storage;
        }
        if self.output.is_some() {
            raw.storage.path = self.output;
        }
    }
}

fn load_config(path: Option<&std::path::Path>, overrides: Overrides) -> anyhow::Result<AppConfig> {
    let mut raw = RawConfig::load(path)?;
    raw.apply_env()?;
    overrides.apply(&mut raw);
    Ok(raw.resolve()?)
}

async fn run(config: AppConfig) -> anyhow::Result<ProcessingSummary> {
    info!("Starting places scraper");
    info!(
        "Configuration loaded: location=({}, {}), radius={}m, type={}, source={}, storage={}",
        config.search.latitude,
        config.search.longitude,
        config.search.radius_meters,
        config.search.business_type,
        config.pipeline.source,
        config.storage.kind
    );

    let gateway = PlacesGateway::new(&config.api).map_err(|e| {
        error!("API client critical error: {}", e);
        e
    })?;

    let sink = create_sink(&config.storage, config.pipeline.source.layout())?;
    sink.setup()
        .await
        .with_context(|| format!("failed to prepare storage at {}", sink.describe()))?;

    let pipeline = Pipeline::new(gateway, sink, config.pipeline);
    let summary = pipeline
        .process_location(&config.search)
        .await
        .map_err(|e| {
            error!("Run aborted: {}", e);
            e
        })?;

    info!("Places scraper finished successfully");
    Ok(summary)
}

fn print_summary(summary: &ProcessingSummary) {
    println!("\n📊 Results for run {}:", summary.run_id);
    println!("   Places found: {}", summary.total_places);
    println!("   Processed: {}", summary.processed_count);
    println!("   Failed: {}", summary.failed_count);
    println!("   Skipped (no place_id): {}", summary.skipped_count);
    println!("   Batches saved: {}", summary.batches_saved);
    if summary.failed_batches > 0 {
        println!(
            "\n⚠️  {} batch(es) failed to save; {} records were dropped",
            summary.failed_batches, summary.dropped_records
        );
    }
}

fn print_config(config: &AppConfig) {
    println!("✅ Configuration is valid");
    println!("   Location: ({}, {})", config.search.latitude, config.search.longitude);
    println!("   Radius: {}m", config.search.radius_meters);
    println!("   Business type: {}", config.search.business_type);
    println!("   API endpoint: {}", config.api.base_url);
    println!("   Source: {}", config.pipeline.source);
    println!("   Batch size: {}", config.pipeline.batch_size);
    match &config.storage.path {
        Some(path) => println!("   Storage: {} at {}", config.storage.kind, path.display()),
        None => println!("   Storage: {}", config.storage.kind),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { overrides } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            let _guard = logging::init_logging(&config.log_level);
            let summary = run(config).await?;
            print_summary(&summary);
        }
        Commands::CheckConfig { overrides } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            print_config(&config);
        }
    }
    Ok(())
}
