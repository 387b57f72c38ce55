//! Ingestion tests over synthetic GeoTIFF sources.

use ingestion::{
    GeoTiffSource, IngestOptions, Ingester, IngestionError, MemorySource, SourceReader,
};
use raster_common::{BoundingBox, ColorSpace, ImageFormat, RasterError};
use renderer::{codec, Canvas, GeoReference};
use test_utils::{
    assert_bbox_approx_eq, decode_coordinate, gray_pattern, require_test_file, temp_store,
    temp_test_dir, SyntheticGeoTiff,
};

// ============================================================================
// Helper functions
// ============================================================================

fn png_options(tile_size: u32) -> IngestOptions {
    IngestOptions {
        tile_size,
        format: Some(ImageFormat::Png),
        ..Default::default()
    }
}

fn overlap_area(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let w = a.max_x.min(b.max_x) - a.min_x.max(b.min_x);
    let h = a.max_y.min(b.max_y) - a.min_y.max(b.min_y);
    if w > 0.0 && h > 0.0 {
        w * h
    } else {
        0.0
    }
}

/// Fails on the `fail_at`-th window read.
struct FailingSource {
    inner: MemorySource,
    reads: usize,
    fail_at: usize,
}

impl SourceReader for FailingSource {
    fn width(&self) -> u32 {
        self.inner.width()
    }
    fn height(&self) -> u32 {
        self.inner.height()
    }
    fn color_space(&self) -> ColorSpace {
        self.inner.color_space()
    }
    fn epsg(&self) -> Option<i32> {
        self.inner.epsg()
    }
    fn transform(&self) -> ingestion::Affine {
        self.inner.transform()
    }
    fn layout(&self) -> String {
        "failing".to_string()
    }
    fn read_window(&mut self, x: u32, y: u32, w: u32, h: u32) -> ingestion::Result<Canvas> {
        self.reads += 1;
        if self.reads == self.fail_at {
            return Err(IngestionError::source_read("simulated read failure"));
        }
        self.inner.read_window(x, y, w, h)
    }
}

// ============================================================================
// GeoTIFF reader
// ============================================================================

#[test]
fn test_reader_georeference_and_strips() {
    let dir = temp_test_dir();
    let path = dir.path().join("strips.tif");
    let synth = SyntheticGeoTiff::new(200, 150)
        .origin(1000.0, 5000.0)
        .pixel_size(0.5)
        .rows_per_strip(16);
    synth.write(&path).unwrap();

    let mut src = GeoTiffSource::open(&path).unwrap();
    assert_eq!((src.width(), src.height()), (200, 150));
    assert_eq!(src.epsg(), Some(32632));
    assert_eq!(src.color_space(), ColorSpace::Rgb);
    assert!(!src.is_tiled());
    assert_eq!(src.pixel_to_map(0.0, 0.0), (1000.0, 5000.0));
    assert_eq!(src.pixel_to_map(200.0, 150.0), (1100.0, 4925.0));

    // Spans three strips.
    let window = src.read_window(190, 10, 10, 30).unwrap();
    for (i, &p) in window.pixels().iter().enumerate() {
        let (x, y) = decode_coordinate(p);
        assert_eq!((x, y), (190 + (i % 10) as u32, 10 + (i / 10) as u32));
    }
}

#[test]
fn test_reader_grayscale() {
    let dir = temp_test_dir();
    let path = dir.path().join("gray.tif");
    SyntheticGeoTiff::new(64, 64)
        .pixels(gray_pattern(64, 64))
        .gray()
        .epsg(Some(4326))
        .write(&path)
        .unwrap();

    let mut src = GeoTiffSource::open(&path).unwrap();
    assert_eq!(src.color_space(), ColorSpace::Grayscale);
    assert_eq!(src.epsg(), Some(4326));
    let all = src.read_window(0, 0, 64, 64).unwrap();
    assert_eq!(all.pixels(), gray_pattern(64, 64).as_slice());
}

#[test]
fn test_reader_rejects_out_of_range_window() {
    let dir = temp_test_dir();
    let path = dir.path().join("small.tif");
    SyntheticGeoTiff::new(32, 32).write(&path).unwrap();
    let mut src = GeoTiffSource::open(&path).unwrap();
    assert!(src.read_window(20, 0, 20, 5).is_err());
}

#[test]
fn test_reader_rejects_non_tiff() {
    let dir = temp_test_dir();
    let path = dir.path().join("bogus.tif");
    std::fs::write(&path, b"not a tiff at all").unwrap();
    assert!(GeoTiffSource::open(&path).is_err());
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_single_tile_footprint_equals_extent() {
    let (dir, _db, store) = temp_store("ortho").await;
    let path = dir.path().join("one.tif");
    let synth = SyntheticGeoTiff::new(300, 200).origin(1000.0, 5000.0).pixel_size(0.5);
    synth.write(&path).unwrap();

    let ingester = Ingester::new(&store, IngestOptions::default()).unwrap();
    let result = ingester.ingest_file(&path).await.unwrap();
    assert_eq!(result.tiles_written, 1);
    assert_eq!(result.plan.encoding, "jpeg-rgb");
    assert_eq!(result.plan.srid, 32632);

    let footprints = store
        .source_footprints(&path.display().to_string(), 0.5, 0.5)
        .await
        .unwrap();
    assert_eq!(footprints.len(), 1);
    let fp = footprints.get(0).unwrap();
    assert_eq!(fp.bbox, synth.extent());
    assert_eq!((fp.width, fp.height), (300, 200));

    let levels = store.load_levels().await.unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].tile_count, 1);
}

#[tokio::test]
async fn test_tiles_cover_extent_without_overlap() {
    let (dir, _db, store) = temp_store("ortho").await;
    let path = dir.path().join("grid.tif");
    let synth = SyntheticGeoTiff::new(1001, 700)
        .origin(500_000.0, 4_600_000.0)
        .pixel_size(2.0)
        .rows_per_strip(37);
    synth.write(&path).unwrap();

    let ingester = Ingester::new(&store, png_options(512)).unwrap();
    let result = ingester.ingest_file(&path).await.unwrap();
    let grid = result.plan.grid;
    assert_eq!((grid.tile_width, grid.tile_height), (501, 350));
    assert_eq!(result.tiles_written, 4);
    assert_eq!(
        result.tiles_written,
        (1001u32.div_ceil(grid.tile_width) * 700u32.div_ceil(grid.tile_height)) as usize
    );

    let footprints = store
        .source_footprints(&path.display().to_string(), 2.0, 2.0)
        .await
        .unwrap();
    let extent = synth.extent();
    let mut area = 0.0;
    for (i, a) in footprints.iter().enumerate() {
        assert!(a.bbox.min_x >= extent.min_x && a.bbox.max_x <= extent.max_x);
        assert!(a.bbox.min_y >= extent.min_y && a.bbox.max_y <= extent.max_y);
        area += a.bbox.width() * a.bbox.height();
        for b in footprints.iter().skip(i + 1) {
            assert_eq!(overlap_area(&a.bbox, &b.bbox), 0.0);
        }
    }
    test_utils::assert_approx_eq!(area, extent.width() * extent.height(), 1e-3);
    assert_bbox_approx_eq!(footprints.extent().unwrap(), extent, 1e-6);
}

#[tokio::test]
async fn test_tile_pixels_come_from_their_window() {
    let (dir, _db, store) = temp_store("ortho").await;
    let path = dir.path().join("pixels.tif");
    SyntheticGeoTiff::new(1001, 700).rows_per_strip(64).write(&path).unwrap();

    let ingester = Ingester::new(&store, png_options(512)).unwrap();
    ingester.ingest_file(&path).await.unwrap();

    let footprints = store
        .source_footprints(&path.display().to_string(), 1.0, 1.0)
        .await
        .unwrap();
    // tile_id 3 is the lower-right tile at (501, 350).
    let fp = footprints.find(|f| f.tile_id == 3).unwrap();
    assert_eq!((fp.width, fp.height), (500, 350));
    let tile = codec::decode(&store.tile_blob(fp.id).await.unwrap()).unwrap();
    assert_eq!(decode_coordinate(tile.get(0, 0).unwrap()), (501, 350));
    assert_eq!(decode_coordinate(tile.get(499, 349).unwrap()), (1000, 699));
}

#[tokio::test]
async fn test_grayscale_source_encoding() {
    let (dir, _db, store) = temp_store("gray").await;
    let path = dir.path().join("gray.tif");
    SyntheticGeoTiff::new(256, 128)
        .pixels(gray_pattern(256, 128))
        .gray()
        .write(&path)
        .unwrap();

    let ingester = Ingester::new(&store, png_options(512)).unwrap();
    let result = ingester.ingest_file(&path).await.unwrap();
    assert_eq!(result.plan.encoding, "png-gray");

    let fp_id = store
        .source_footprints(&path.display().to_string(), 1.0, 1.0)
        .await
        .unwrap()
        .get(0)
        .unwrap()
        .id;
    let tile = codec::decode(&store.tile_blob(fp_id).await.unwrap()).unwrap();
    assert_eq!(tile.color_space(), ColorSpace::Grayscale);
    assert_eq!(tile.pixels(), gray_pattern(256, 128).as_slice());
}

#[tokio::test]
async fn test_epsg_override() {
    let (dir, _db, store) = temp_store("ortho").await;
    let path = dir.path().join("utm.tif");
    SyntheticGeoTiff::new(64, 64).write(&path).unwrap();

    let options = IngestOptions {
        epsg_override: Some(3003),
        ..Default::default()
    };
    let result = Ingester::new(&store, options)
        .unwrap()
        .ingest_file(&path)
        .await
        .unwrap();
    assert_eq!(result.plan.srid, 3003);
    assert_eq!(store.srid().await.unwrap(), Some(3003));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (dir, _db, store) = temp_store("ortho").await;
    let path = dir.path().join("plan.tif");
    SyntheticGeoTiff::new(1000, 1000).write(&path).unwrap();

    let options = IngestOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = Ingester::new(&store, options)
        .unwrap()
        .ingest_file(&path)
        .await
        .unwrap();
    assert!(result.dry_run);
    assert_eq!(result.tiles_written, 0);
    assert_eq!(result.plan.grid.tile_count(), 4);
    assert_eq!(store.tile_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_too_many_tiles_rejected_before_writing() {
    let (_dir, _db, store) = temp_store("wide").await;
    // 8193 columns of 128-pixel tiles.
    let width = 128 * 8193;
    let canvas = Canvas::filled(width, 1, 0x808080);
    let georef = GeoReference::from_center(0.0, 0.0, width, 1, 1.0, 1.0, Some(32632));
    let mut source = MemorySource::new(canvas, georef);

    let ingester = Ingester::new(&store, png_options(128)).unwrap();
    let err = ingester.ingest_source("wide", &mut source).await.unwrap_err();
    assert!(matches!(
        err,
        IngestionError::Raster(RasterError::TooManyTiles { count: 8193, limit: 8192 })
    ));
    assert_eq!(store.tile_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failure_rolls_back_whole_source() {
    let (_dir, _db, store) = temp_store("ortho").await;
    let canvas = Canvas::filled(1000, 1000, 0x123456);
    let georef = GeoReference::from_center(500.0, 500.0, 1000, 1000, 1.0, 1.0, Some(32632));
    let mut source = FailingSource {
        inner: MemorySource::new(canvas, georef),
        reads: 0,
        fail_at: 3,
    };

    let ingester = Ingester::new(&store, png_options(512)).unwrap();
    assert!(ingester.ingest_source("broken", &mut source).await.is_err());
    assert_eq!(source.reads, 3);
    assert_eq!(store.tile_count().await.unwrap(), 0);
    assert!(store.load_levels().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_dir() {
    let (dir, _db, store) = temp_store("mosaic").await;
    let sources = dir.path().join("sources");
    std::fs::create_dir_all(sources.join("nested")).unwrap();
    SyntheticGeoTiff::new(128, 128).write(sources.join("a.tif")).unwrap();
    SyntheticGeoTiff::new(128, 128)
        .origin(128.0, 128.0)
        .write(sources.join("nested").join("b.TIFF"))
        .unwrap();
    std::fs::write(sources.join("notes.txt"), b"ignored").unwrap();
    std::fs::write(sources.join("broken.tif"), b"garbage").unwrap();

    let ingester = Ingester::new(&store, IngestOptions::default()).unwrap();
    let report = ingester.ingest_dir(&sources).await.unwrap();
    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("broken.tif"));
    assert_eq!(report.tiles_written(), 2);
    assert_eq!(store.tile_count().await.unwrap(), 2);

    let extent = store.extent().await.unwrap().unwrap();
    assert_eq!(extent, BoundingBox::new(0.0, 0.0, 256.0, 128.0));
}

#[tokio::test]
async fn test_real_orthophoto() {
    let path = require_test_file!("orthophoto.tif");
    let (_dir, _db, store) = temp_store("ortho").await;
    let result = Ingester::new(&store, IngestOptions::default())
        .unwrap()
        .ingest_file(&path)
        .await
        .unwrap();
    assert_eq!(result.tiles_written, result.plan.grid.tile_count());
}
