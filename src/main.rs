use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use sightline::config::{EngineConfig, ResolveSources};
use sightline::engine::{default_geodb, GrassEngine};
use sightline::raster::{GeoTiffCodec, RasterCodec};
use sightline::subprocess::SubprocessManager;

/// Compute viewsheds by orchestrating a local GRASS GIS install
#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Compute viewsheds by orchestrating a local GRASS GIS install", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version of the GRASS install backing this host
    Version,
    /// List the operations this host currently advertises
    Ops {
        /// Emit the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute the viewshed of a point on an elevation raster
    Viewshed {
        /// Input elevation raster (GeoTIFF)
        #[arg(long)]
        dem: PathBuf,

        /// Observer x coordinate in map units
        #[arg(long, allow_hyphen_values = true)]
        x: f64,

        /// Observer y coordinate in map units
        #[arg(long, allow_hyphen_values = true)]
        y: f64,

        /// Where to write the result raster
        #[arg(long)]
        output: PathBuf,

        /// GRASS launcher path, overriding detection and the GRASS variable
        #[arg(long)]
        grass: Option<PathBuf>,

        /// GRASS module directory, overriding detection and GRASS_MODULES
        #[arg(long)]
        modules: Option<PathBuf>,

        /// Geodatabase root (default: ~/grassdata)
        #[arg(long)]
        geodb: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Version => {
            let engine = GrassEngine::from_env();
            println!("{}", engine.version().await.trim_end());
        }
        Commands::Ops { json } => {
            let engine = GrassEngine::from_env();
            let ops = engine.operations();
            if json {
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else {
                for op in &ops {
                    println!("{} - {}", op.name, op.title);
                }
            }
        }
        Commands::Viewshed {
            dem,
            x,
            y,
            output,
            grass,
            modules,
            geodb,
        } => {
            let mut sources = ResolveSources::from_env();
            if let Some(path) = grass {
                sources.executable_override = Some(path);
            }
            if let Some(path) = modules {
                sources.modules_override = Some(path);
            }
            let config = Arc::new(EngineConfig::resolve_from(&sources));
            anyhow::ensure!(
                config.is_available(),
                "no usable GRASS install found; set GRASS/GRASS_MODULES or pass --grass/--modules"
            );

            let engine = GrassEngine::new(
                config,
                SubprocessManager::production(),
                geodb.unwrap_or_else(default_geodb),
                Arc::new(GeoTiffCodec),
            );
            debug!("geodatabase root: {}", engine.geodb().display());

            let input = GeoTiffCodec
                .read(&dem)
                .with_context(|| format!("failed to read {}", dem.display()))?;
            let result = engine
                .viewshed(&input, x, y)
                .await
                .context("viewshed computation failed")?;
            GeoTiffCodec
                .write(&output, &result)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("wrote {} ({} bytes)", output.display(), result.len());
        }
    }
    Ok(())
}
