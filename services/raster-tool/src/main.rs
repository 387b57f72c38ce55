//! Raster pyramid command line tool.
//!
//! Loads GeoTIFF sources into a SQLite raster pyramid, builds the
//! per-source and topmost levels, and renders map windows from it.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use raster_common::{ImageFormat, RawFormat};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use config::ToolConfig;

#[derive(Parser, Debug)]
#[command(name = "raster-tool")]
#[command(about = "Load, pyramidize and render tiled raster pyramids stored in SQLite")]
struct Args {
    /// SQLite database holding the pyramid
    #[arg(short, long, env = "RASTER_DB", global = true)]
    db: Option<PathBuf>,

    /// Table prefix of the pyramid
    #[arg(short, long, env = "RASTER_TABLE", global = true)]
    table: Option<String>,

    /// YAML file with default options
    #[arg(short, long, env = "RASTER_TOOL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tile a GeoTIFF file, or every GeoTIFF under a directory, into the store
    Load(LoadArgs),
    /// Build per-source pyramid levels above the finest level
    Pyramid(PyramidArgs),
    /// Build shared levels above the coarsest per-source level
    Topmost(TopmostArgs),
    /// Render a map window to an image, raw pixel array or GeoTIFF
    Render(RenderArgs),
    /// Print levels, extent and SRID as JSON
    Info(InfoArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LoadArgs {
    /// GeoTIFF file or directory
    pub path: PathBuf,

    /// Largest tile edge in pixels (128-8192)
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Tile format: jpeg, png, gif or tiff
    #[arg(long)]
    pub format: Option<ImageFormat>,

    /// JPEG quality (10-90)
    #[arg(long)]
    pub quality: Option<u8>,

    /// SRID to store instead of the one found in the source
    #[arg(long)]
    pub epsg: Option<i32>,

    /// Plan the tile grid without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug)]
pub struct PyramidArgs {
    /// Tile format: jpeg, png or tiff
    #[arg(long)]
    pub format: Option<ImageFormat>,

    #[arg(long)]
    pub quality: Option<u8>,

    /// Accept shared edges that differ by up to this many map units
    #[arg(long)]
    pub tolerance: Option<f64>,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug)]
pub struct TopmostArgs {
    #[arg(long)]
    pub format: Option<ImageFormat>,

    #[arg(long)]
    pub quality: Option<u8>,

    /// Topmost tile edge in pixels, before the 2:1 thumbnail
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Source pixels of this colour are not painted (#RRGGBB)
    #[arg(long)]
    pub transparent: Option<String>,

    /// Fill for uncovered areas (#RRGGBB)
    #[arg(long)]
    pub background: Option<String>,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Window centre X; defaults to the centre of the pyramid extent
    #[arg(long, requires = "y", conflicts_with = "rect")]
    pub x: Option<f64>,

    /// Window centre Y
    #[arg(long, requires = "x")]
    pub y: Option<f64>,

    /// Window by two opposite corners: x1,y1,x2,y2
    #[arg(long, value_delimiter = ',', num_args = 4, allow_negative_numbers = true)]
    pub rect: Option<Vec<f64>>,

    /// Pixel size in map units
    #[arg(long)]
    pub pixel_size: f64,

    /// Vertical pixel size, when different from the horizontal one
    #[arg(long)]
    pub pixel_y_size: Option<f64>,

    #[arg(long, default_value = "512")]
    pub width: u32,

    #[arg(long, default_value = "512")]
    pub height: u32,

    /// Image format: jpeg, png, gif or tiff
    #[arg(long, conflicts_with_all = ["raw", "geotiff"])]
    pub format: Option<ImageFormat>,

    /// JPEG quality (1-100)
    #[arg(long)]
    pub quality: Option<u8>,

    /// Write a raw pixel array: rgb, rgba, argb, bgr or bgra
    #[arg(long, conflicts_with = "geotiff")]
    pub raw: Option<RawFormat>,

    /// Write a georeferenced TIFF
    #[arg(long)]
    pub geotiff: bool,

    #[arg(long)]
    pub transparent: Option<String>,

    #[arg(long)]
    pub background: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct InfoArgs {
    /// Also report the level and strategy chosen for this pixel size
    #[arg(long)]
    pub pixel_size: Option<f64>,
}

/// Store location shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Target {
    pub db: PathBuf,
    pub table: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    let target = Target {
        db: args
            .db
            .clone()
            .context("No database given; use --db or RASTER_DB")?,
        table: args
            .table
            .clone()
            .context("No table prefix given; use --table or RASTER_TABLE")?,
    };
    let config = ToolConfig::load_or_default(args.config.as_deref())?;
    debug!(db = %target.db.display(), table = %target.table, "Resolved target");

    // Store access is strictly sequential.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async move {
        match args.command {
            Command::Load(cmd) => commands::load(&target, &config, cmd).await,
            Command::Pyramid(cmd) => commands::pyramids(&target, &config, cmd).await,
            Command::Topmost(cmd) => commands::topmost(&target, &config, cmd).await,
            Command::Render(cmd) => commands::render(&target, &config, cmd).await,
            Command::Info(cmd) => commands::info(&target, cmd).await,
        }
    })
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
