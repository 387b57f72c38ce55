//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use datasource::{DataSource, ViewWindow};
use ingestion::{IngestOptions, Ingester};
use pyramid::{build_pyramids, build_topmost_levels};
use serde::Serialize;
use storage::RasterStore;
use tracing::{info, warn};

use crate::config::{parse_color, ToolConfig};
use crate::{InfoArgs, LoadArgs, PyramidArgs, RenderArgs, Target, TopmostArgs};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_for_writing(target: &Target) -> Result<RasterStore> {
    RasterStore::create(&target.db, &target.table)
        .await
        .with_context(|| format!("Failed to open {}", target.db.display()))
}

#[derive(Serialize)]
struct LoadSummary {
    sources: Vec<ingestion::IngestionResult>,
    failed: Vec<String>,
    tiles_written: usize,
}

pub async fn load(target: &Target, config: &ToolConfig, args: LoadArgs) -> Result<()> {
    let options = IngestOptions {
        tile_size: args.tile_size.unwrap_or(config.load.tile_size),
        format: args.format.or(config.load.format),
        quality: args.quality.unwrap_or(config.load.quality),
        epsg_override: args.epsg.or(config.load.epsg_override),
        dry_run: args.dry_run || config.load.dry_run,
    };

    let store = open_for_writing(target).await?;
    let ingester = Ingester::new(&store, options).context("Invalid load options")?;

    let summary = if args.path.is_dir() {
        let report = ingester
            .ingest_dir(&args.path)
            .await
            .with_context(|| format!("Failed to load {}", args.path.display()))?;
        for (path, err) in &report.failed {
            warn!(path = %path.display(), error = %err, "Source not loaded");
        }
        LoadSummary {
            tiles_written: report.tiles_written(),
            failed: report
                .failed
                .iter()
                .map(|(path, err)| format!("{}: {}", path.display(), err))
                .collect(),
            sources: report.loaded,
        }
    } else {
        let result = ingester
            .ingest_file(&args.path)
            .await
            .with_context(|| format!("Failed to load {}", args.path.display()))?;
        LoadSummary {
            tiles_written: result.tiles_written,
            failed: Vec::new(),
            sources: vec![result],
        }
    };

    store.close().await;
    info!(
        sources = summary.sources.len(),
        failed = summary.failed.len(),
        tiles = summary.tiles_written,
        "Load finished"
    );
    print_json(&summary)
}

pub async fn pyramids(target: &Target, config: &ToolConfig, args: PyramidArgs) -> Result<()> {
    let mut pyramid_config = config.pyramid_config()?;
    if let Some(format) = args.format {
        pyramid_config.format = format;
    }
    if let Some(quality) = args.quality {
        pyramid_config.quality = quality;
    }
    if let Some(tolerance) = args.tolerance {
        pyramid_config.neighbor_tolerance = tolerance;
    }
    pyramid_config.dry_run = args.dry_run;

    let store = open_for_writing(target).await?;
    let report = build_pyramids(&store, &pyramid_config)
        .await
        .context("Pyramid build failed")?;
    store.close().await;
    print_json(&report)
}

pub async fn topmost(target: &Target, config: &ToolConfig, args: TopmostArgs) -> Result<()> {
    let mut pyramid_config = config.pyramid_config()?;
    if let Some(format) = args.format {
        pyramid_config.format = format;
    }
    if let Some(quality) = args.quality {
        pyramid_config.quality = quality;
    }
    if let Some(size) = args.tile_size {
        pyramid_config.tile_size = size;
    }
    if let Some(hex) = &args.transparent {
        pyramid_config.transparent_color = Some(parse_color(hex)?);
    }
    if let Some(hex) = &args.background {
        pyramid_config.background_color = parse_color(hex)?;
    }
    pyramid_config.dry_run = args.dry_run;

    let store = open_for_writing(target).await?;
    let report = build_topmost_levels(&store, &pyramid_config)
        .await
        .context("Topmost build failed")?;
    store.close().await;
    print_json(&report)
}

async fn open_for_reading(target: &Target) -> Result<DataSource> {
    DataSource::open(&target.db, &target.table)
        .await
        .with_context(|| format!("Failed to open '{}' in {}", target.table, target.db.display()))
}

pub async fn render(target: &Target, config: &ToolConfig, args: RenderArgs) -> Result<()> {
    if args.pixel_size <= 0.0 || !args.pixel_size.is_finite() {
        bail!("--pixel-size must be > 0");
    }
    let pixel_y_size = args.pixel_y_size.unwrap_or(args.pixel_size);

    let mut ds = open_for_reading(target).await?;
    let (mut transparent, mut background) = config.render_colors()?;
    if let Some(hex) = &args.transparent {
        transparent = Some(parse_color(hex)?);
    }
    if let Some(hex) = &args.background {
        background = parse_color(hex)?;
    }
    ds.set_transparent_color(transparent);
    ds.set_background_color(background);

    let window = match (&args.rect, args.x.zip(args.y)) {
        (Some(rect), _) => ViewWindow::from_rect(
            rect[0],
            rect[1],
            rect[2],
            rect[3],
            args.pixel_size,
            pixel_y_size,
            args.width,
            args.height,
        ),
        (None, Some((x, y))) => {
            ViewWindow::centered_xy(x, y, args.pixel_size, pixel_y_size, args.width, args.height)
        }
        (None, None) => {
            let (x, y) = ds.extent().await?.center();
            ViewWindow::centered_xy(x, y, args.pixel_size, pixel_y_size, args.width, args.height)
        }
    };

    let plan = ds.best_access(window.pixel_x_size)?;
    info!(
        level_pixel_size = plan.pixel_x_size(),
        strategy = ?plan.strategy,
        width = window.width,
        height = window.height,
        "Rendering window"
    );

    if args.geotiff {
        ds.export_geotiff(&args.output, &window)
            .await
            .context("GeoTIFF export failed")?;
    } else {
        let bytes = match args.raw {
            Some(raw) => ds.render_raw(&window, raw).await?,
            None => {
                let format = args.format.unwrap_or(config.render.format);
                let quality = args.quality.unwrap_or(config.render.quality);
                ds.render_window(&window, format, quality).await?
            }
        };
        std::fs::write(&args.output, &bytes)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }

    info!(output = %args.output.display(), "Window rendered");
    ds.close().await;
    Ok(())
}

#[derive(Serialize)]
struct InfoReport {
    #[serde(flatten)]
    info: datasource::DataSourceInfo,
    tile_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_access: Option<datasource::AccessPlan>,
}

pub async fn info(target: &Target, args: InfoArgs) -> Result<()> {
    let mut ds = open_for_reading(target).await?;
    let info = ds.info().await?;
    let tile_count = ds.store().tile_count().await?;
    let best_access = match args.pixel_size {
        Some(pixel_size) => Some(ds.best_access(pixel_size)?),
        None => None,
    };
    ds.close().await;
    print_json(&InfoReport {
        info,
        tile_count,
        best_access,
    })
}
