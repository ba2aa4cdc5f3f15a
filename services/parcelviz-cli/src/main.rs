//! ParcelViz command-line front end.
//!
//! Runs the render pipeline for a single parcel and prints the response JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use parcel_common::{RenderRequest, RenderResponse};
use render_pipeline::{AppSettings, RenderPipeline};

#[derive(Parser, Debug)]
#[command(name = "parcelviz")]
#[command(about = "Render parcel context maps from configured layer sources")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Source config file (overrides CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output root directory (overrides OUTPUT_ROOT)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the render pipeline for one parcel
    Render(RenderArgs),
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Address to resolve
    #[arg(long)]
    address: Option<String>,

    /// Assessor parcel number
    #[arg(long)]
    apn: Option<String>,

    /// Layer names to render
    #[arg(long = "layer", visible_alias = "layers", required = true)]
    layers: Vec<String>,

    /// Buffer distance beyond the parcel geometry, in feet
    #[arg(long, default_value_t = 250.0)]
    buffer_feet: f64,

    /// Output DPI for generated images
    #[arg(long, default_value_t = 220, value_parser = clap::value_parser!(u32).range(96..=600))]
    output_dpi: u32,
}

impl From<RenderArgs> for RenderRequest {
    fn from(args: RenderArgs) -> Self {
        RenderRequest {
            address: args.address,
            apn: args.apn,
            layers: args.layers,
            buffer_feet: args.buffer_feet,
            output_dpi: args.output_dpi,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn print_response(response: &RenderResponse) -> Result<()> {
    if !response.warnings.is_empty() {
        println!("Warnings:");
        for warning in &response.warnings {
            println!("- {}", warning);
        }
    }
    println!("Render complete!");
    println!(
        "{}",
        serde_json::to_string_pretty(response).context("Failed to serialize response")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = AppSettings::from_env()?;
    if let Some(config) = cli.config {
        settings.config_path = config;
    }
    if let Some(output_root) = cli.output_root {
        settings.output_root = output_root;
    }

    // Logs go to stderr so stdout stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(
            cli.log_level.as_deref().unwrap_or(&settings.log_level),
        ))
        .with_writer(std::io::stderr)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Render(args) => {
            let pipeline = RenderPipeline::from_settings(settings)
                .context("Failed to initialize render pipeline")?;
            match pipeline.render(args.into()).await {
                Ok(response) => {
                    print_response(&response)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("Error: {}", err);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
