//! ParcelViz API service.
//!
//! HTTP server exposing the parcel render pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use parcelviz_api::{build_router, state::AppState};
use render_pipeline::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "parcelviz-api")]
#[command(about = "Parcel map render API server")]
struct Args {
    /// Listen address (defaults to API_HOST:API_PORT)
    #[arg(short, long)]
    listen: Option<String>,

    /// Source config file (overrides CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output root directory (overrides OUTPUT_ROOT)
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut settings = AppSettings::from_env()?;
    if let Some(config) = args.config {
        settings.config_path = config;
    }
    if let Some(output_root) = args.output_root {
        settings.output_root = output_root;
    }

    let level = match args
        .log_level
        .as_deref()
        .unwrap_or(&settings.log_level)
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    std::fs::create_dir_all(&settings.output_root).with_context(|| {
        format!("Failed to create output root {}", settings.output_root.display())
    })?;

    let listen = args.listen.unwrap_or_else(|| settings.listen_addr());
    let state = Arc::new(AppState::from_settings(settings)?);
    let app = build_router(state, Some(prometheus_handle));

    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
