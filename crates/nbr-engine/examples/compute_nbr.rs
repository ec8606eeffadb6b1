//! Compute a burn-severity layer from two band URLs and write it as a PNG.
//!
//! ```text
//! cargo run --example compute_nbr -- \
//!     --nir-url https://example.com/B08.tif \
//!     --swir-url https://example.com/B12.tif \
//!     --extent="-121.5,39.4,-121.1,39.8" \
//!     --output severity.png
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nbr_common::BoundingBox;
use nbr_engine::{CoordinatorConfig, NbrCoordinator};

#[derive(Parser, Debug)]
#[command(name = "compute_nbr")]
#[command(about = "Compute an NBR burn-severity layer from two band rasters")]
struct Args {
    /// URL of the near-infrared band raster
    #[arg(long)]
    nir_url: String,

    /// URL of the short-wave-infrared band raster
    #[arg(long)]
    swir_url: String,

    /// Extent as "minx,miny,maxx,maxy" (degrees or Web Mercator meters)
    #[arg(long)]
    extent: String,

    /// Output PNG path
    #[arg(long, default_value = "severity.png")]
    output: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let extent =
        BoundingBox::from_extent_string(&args.extent).context("Failed to parse extent")?;

    let coordinator = NbrCoordinator::new(CoordinatorConfig {
        request_timeout: Duration::from_secs(args.timeout),
        ..CoordinatorConfig::default()
    })?;

    let mut status = coordinator.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = *status.borrow();
            if snapshot.loading {
                info!(progress = snapshot.progress, "computing");
            }
        }
    });

    let result = coordinator
        .request(&args.nir_url, &args.swir_url, &extent, true)
        .await?
        .expect("visible request returns a result");

    let (min, max) = result.value_range();
    info!(
        width = result.image.width,
        height = result.image.height,
        min,
        max,
        extent = %result.display_extent.cache_key(),
        "computation finished"
    );

    let png = result
        .image
        .to_png()
        .map_err(|e| anyhow::anyhow!("PNG encoding failed: {}", e))?;
    std::fs::write(&args.output, &png)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "{}",
        serde_json::json!({
            "output": args.output,
            "width": result.image.width,
            "height": result.image.height,
            "min": min,
            "max": max,
            "transparent_pixels": result.image.transparent_pixels,
        })
    );

    Ok(())
}
