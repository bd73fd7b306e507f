use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use shortlist::{load_json, DomainPermutations, EngineConfig, RawRequest, ResultView, RetrievalEngine};

/// Run one retrieval against a JSON catalog
#[derive(Parser, Debug)]
#[command(name = "shortlist")]
#[command(about = "Candidate retrieval, ranking and diversification", long_about = None)]
struct Args {
    /// Catalog file, a JSON array of items
    #[arg(short, long)]
    catalog: PathBuf,

    /// Request file in the raw NLU shape
    #[arg(short, long)]
    request: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Shortlist v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => shortlist_retrieval::config::load(path)?,
        None => EngineConfig::default(),
    };

    let catalog = load_json(&args.catalog)?;
    info!("Catalog loaded: {} items from {:?}", catalog.iter().len(), args.catalog);
    let generator = DomainPermutations::from_catalog(&catalog);

    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("failed to read request file {:?}", args.request))?;
    let request: RawRequest =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse request file {:?}", args.request))?;

    let engine = RetrievalEngine::builder(Arc::new(catalog))
        .generator(Arc::new(generator))
        .config(config)
        .build()?;

    let result = engine.retrieve_raw(request).await?;
    info!(
        "Returned {} results (tier {:?}, pool {})",
        result.len(),
        result.diagnostics.fallback_tier,
        result.diagnostics.pool_after_dedup
    );

    println!("{}", serde_json::to_string_pretty(&ResultView::from_result(&result))?);
    Ok(())
}
