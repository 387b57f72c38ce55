//! Raster tile store on SQLite.
//!
//! One [`RasterStore`] serves one table prefix. Reads go straight to the
//! pool; bulk writes go through a [`TileWriter`] that owns a transaction
//! and rolls back unless committed.

use std::path::Path;

use futures::TryStreamExt;
use raster_common::{
    AccessStrategy, BoundingBox, FootprintStore, RasterError, RasterResult, ResolutionLevel,
    TileFootprint, TOPMOST_SOURCE,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, FromRow, Sqlite, Transaction};
use tracing::{debug, info};

use crate::schema::{quote_ident, TableNames, PYRAMIDS_TABLE, RESOLUTION_INDEX};
use crate::wkb;

/// A tile footprint together with its encoded blob.
#[derive(Debug, Clone)]
pub struct StoredTile {
    pub footprint: TileFootprint,
    pub raster: Vec<u8>,
}

/// A tile about to be written.
#[derive(Debug, Clone)]
pub struct NewTile<'a> {
    pub source_name: &'a str,
    pub tile_id: i64,
    pub width: u32,
    pub height: u32,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub bbox: BoundingBox,
    pub srid: i32,
    pub raster: &'a [u8],
}

#[derive(Debug, FromRow)]
struct TileRow {
    id: i64,
    tile_id: i64,
    srid: i32,
    width: i64,
    height: i64,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

#[derive(Debug, FromRow)]
struct TileWithRasterRow {
    #[sqlx(flatten)]
    meta: TileRow,
    raster: Vec<u8>,
}

impl From<TileRow> for TileFootprint {
    fn from(row: TileRow) -> Self {
        TileFootprint {
            id: row.id,
            tile_id: row.tile_id,
            srid: row.srid,
            bbox: BoundingBox::new(row.min_x, row.min_y, row.max_x, row.max_y),
            width: row.width as u32,
            height: row.height as u32,
        }
    }
}

fn store_err(what: &str) -> impl FnOnce(sqlx::Error) -> RasterError + '_ {
    move |e| RasterError::Store(format!("{}: {}", what, e))
}

async fn fetch_tiles<'e, E>(
    executor: E,
    sql: &str,
    window: &BoundingBox,
    px: f64,
    py: f64,
) -> RasterResult<Vec<StoredTile>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut rows = sqlx::query_as::<_, TileWithRasterRow>(sql)
        .bind(window.max_x)
        .bind(window.min_x)
        .bind(window.max_y)
        .bind(window.min_y)
        .bind(px)
        .bind(py)
        .fetch(executor);

    let mut tiles = Vec::new();
    while let Some(row) = rows.try_next().await.map_err(store_err("Tile query failed"))? {
        tiles.push(StoredTile {
            footprint: row.meta.into(),
            raster: row.raster,
        });
    }
    Ok(tiles)
}

async fn fetch_footprints<'e, E>(
    executor: E,
    names: &TableNames,
    source_name: &str,
    px: f64,
    py: f64,
) -> RasterResult<FootprintStore>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, TileRow>(&format!(
        "SELECT id, tile_id, srid, width, height, min_x, min_y, max_x, max_y FROM {} \
         WHERE source_name = ? AND pixel_x_size = ? AND pixel_y_size = ? ORDER BY id",
        names.metadata
    ))
    .bind(source_name)
    .bind(px)
    .bind(py)
    .fetch_all(executor)
    .await
    .map_err(store_err("Footprint query failed"))?;

    Ok(rows.into_iter().map(TileFootprint::from).collect())
}

async fn fetch_blob<'e, E>(executor: E, names: &TableNames, id: i64) -> RasterResult<Vec<u8>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, Vec<u8>>(&format!(
        "SELECT raster FROM {} WHERE id = ?",
        names.rasters
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(store_err("Raster query failed"))?
    .ok_or_else(|| RasterError::NotFound(format!("raster tile {}", id)))
}

/// Database pool and table names for one raster prefix.
pub struct RasterStore {
    pool: SqlitePool,
    names: TableNames,
    index_query: String,
    scan_query: String,
}

impl RasterStore {
    /// Open an existing database. Tables are not created.
    pub async fn open(path: &Path, prefix: &str) -> RasterResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);
        let store = Self::connect(options, prefix).await?;
        info!(path = %path.display(), prefix, "Opened raster store");
        Ok(store)
    }

    /// Open or create a database and make sure the prefix's tables exist.
    pub async fn create(path: &Path, prefix: &str) -> RasterResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let store = Self::connect(options, prefix).await?;
        store.bootstrap().await?;
        info!(path = %path.display(), prefix, "Opened raster store for writing");
        Ok(store)
    }

    /// In-memory store with tables created (for testing).
    pub async fn open_memory(prefix: &str) -> RasterResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let store = Self::connect(options, prefix).await?;
        store.bootstrap().await?;
        Ok(store)
    }

    async fn connect(options: SqliteConnectOptions, prefix: &str) -> RasterResult<Self> {
        // One connection: all access is serialised and in-memory databases
        // live exactly as long as the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(store_err("Connection failed"))?;

        let names = TableNames::new(prefix);
        Ok(Self {
            pool,
            index_query: names.index_query(),
            scan_query: names.scan_query(),
            names,
        })
    }

    /// Create the prefix's tables, spatial index and triggers if missing.
    pub async fn bootstrap(&self) -> RasterResult<()> {
        for statement in self.names.create_statements() {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(store_err("Schema creation failed"))?;
        }
        Ok(())
    }

    pub fn table_prefix(&self) -> &str {
        &self.names.prefix
    }

    pub fn names(&self) -> &TableNames {
        &self.names
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub async fn has_table(&self, name: &str) -> RasterResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err("Query failed"))?;
        Ok(count > 0)
    }

    /// Check that the catalogue and the prefix's tables are present.
    pub async fn validate(&self) -> RasterResult<()> {
        if !self.has_table(PYRAMIDS_TABLE).await? {
            return Err(RasterError::NotFound(
                "this DB doesn't seem to contain a valid raster_pyramids table".to_string(),
            ));
        }
        for table in [self.names.raw_rasters(), self.names.raw_metadata()] {
            if !self.has_table(&table).await? {
                return Err(RasterError::NotFound(format!(
                    "table \"{}\" does not exist",
                    table
                )));
            }
        }
        Ok(())
    }

    /// Catalogue levels for this prefix, coarsest first.
    pub async fn load_levels(&self) -> RasterResult<Vec<ResolutionLevel>> {
        let rows: Vec<(f64, f64, i64)> = sqlx::query_as(&format!(
            "SELECT pixel_x_size, pixel_y_size, tile_count FROM {} \
             WHERE table_prefix = ? ORDER BY pixel_x_size DESC",
            PYRAMIDS_TABLE
        ))
        .bind(&self.names.prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("Level query failed"))?;

        Ok(rows
            .into_iter()
            .map(|(px, py, count)| ResolutionLevel::new(px, py, count))
            .collect())
    }

    /// SRID shared by the stored tiles, if any tile exists.
    pub async fn srid(&self) -> RasterResult<Option<i32>> {
        let srids: Vec<i32> = sqlx::query_scalar(&format!(
            "SELECT DISTINCT srid FROM {} ORDER BY srid",
            self.names.metadata
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("SRID query failed"))?;

        match srids.as_slice() {
            [] => Ok(None),
            [srid] => Ok(Some(*srid)),
            many => Err(RasterError::GeometryMismatch(format!(
                "tiles use {} different SRIDs",
                many.len()
            ))),
        }
    }

    /// Full extent of every stored tile.
    pub async fn extent(&self) -> RasterResult<Option<BoundingBox>> {
        self.extent_where(None).await
    }

    /// Extent of the tiles at one pixel size.
    pub async fn level_extent(&self, px: f64, py: f64) -> RasterResult<Option<BoundingBox>> {
        self.extent_where(Some((px, py))).await
    }

    async fn extent_where(&self, level: Option<(f64, f64)>) -> RasterResult<Option<BoundingBox>> {
        let mut sql = format!(
            "SELECT MIN(min_x), MIN(min_y), MAX(max_x), MAX(max_y) FROM {}",
            self.names.metadata
        );
        if level.is_some() {
            sql.push_str(" WHERE pixel_x_size = ? AND pixel_y_size = ?");
        }

        let mut query =
            sqlx::query_as::<_, (Option<f64>, Option<f64>, Option<f64>, Option<f64>)>(&sql);
        if let Some((px, py)) = level {
            query = query.bind(px).bind(py);
        }
        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("Extent query failed"))?;

        Ok(match row {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            }
            _ => None,
        })
    }

    /// Tiles of level `(px, py)` intersecting `window`, in id order.
    pub async fn tiles_in_window(
        &self,
        window: &BoundingBox,
        px: f64,
        py: f64,
        strategy: AccessStrategy,
    ) -> RasterResult<Vec<StoredTile>> {
        let sql = match strategy {
            AccessStrategy::SpatialIndex => &self.index_query,
            AccessStrategy::Scan => &self.scan_query,
        };
        let tiles = fetch_tiles(&self.pool, sql, window, px, py).await?;
        debug!(
            tiles = tiles.len(),
            strategy = ?strategy,
            pixel_x_size = px,
            "Fetched tiles for window"
        );
        Ok(tiles)
    }

    /// Smallest stored pixel size.
    pub async fn min_pixel_size(&self) -> RasterResult<Option<(f64, f64)>> {
        let row: (Option<f64>, Option<f64>) = sqlx::query_as(&format!(
            "SELECT MIN(pixel_x_size), MIN(pixel_y_size) FROM {} \
             WHERE pixel_x_size > 0 AND pixel_y_size > 0",
            self.names.metadata
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(store_err("Query failed"))?;
        Ok(row.0.zip(row.1))
    }

    /// Largest pixel size among ingested and adjacency-built tiles.
    pub async fn max_source_pixel_size(&self) -> RasterResult<Option<(f64, f64)>> {
        let row: (Option<f64>, Option<f64>) = sqlx::query_as(&format!(
            "SELECT MAX(pixel_x_size), MAX(pixel_y_size) FROM {} \
             WHERE source_name <> ? AND pixel_x_size > 0 AND pixel_y_size > 0",
            self.names.metadata
        ))
        .bind(TOPMOST_SOURCE)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err("Query failed"))?;
        Ok(row.0.zip(row.1))
    }

    /// Sources with tiles at `(px, py)` and their tile counts, by name.
    pub async fn sources_at(&self, px: f64, py: f64) -> RasterResult<Vec<(String, i64)>> {
        sqlx::query_as(&format!(
            "SELECT source_name, COUNT(*) FROM {} \
             WHERE pixel_x_size = ? AND pixel_y_size = ? \
             GROUP BY source_name ORDER BY source_name",
            self.names.metadata
        ))
        .bind(px)
        .bind(py)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("Source query failed"))
    }

    /// Footprints of one source at one pixel size.
    pub async fn source_footprints(
        &self,
        source_name: &str,
        px: f64,
        py: f64,
    ) -> RasterResult<FootprintStore> {
        fetch_footprints(&self.pool, &self.names, source_name, px, py).await
    }

    pub async fn tile_blob(&self, id: i64) -> RasterResult<Vec<u8>> {
        fetch_blob(&self.pool, &self.names, id).await
    }

    /// Footprint decoded from the stored WKB geometry.
    pub async fn tile_geometry(&self, id: i64) -> RasterResult<BoundingBox> {
        let geometry = sqlx::query_scalar::<_, Vec<u8>>(&format!(
            "SELECT geometry FROM {} WHERE id = ?",
            self.names.metadata
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err("Geometry query failed"))?
        .ok_or_else(|| RasterError::NotFound(format!("tile metadata {}", id)))?;
        wkb::decode_mbr(&geometry)
    }

    pub async fn tile_count(&self) -> RasterResult<i64> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.names.metadata))
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("Count query failed"))
    }

    /// Start a write transaction.
    pub async fn begin(&self) -> RasterResult<TileWriter> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(store_err("BEGIN TRANSACTION failed"))?;
        Ok(TileWriter {
            tx,
            names: self.names.clone(),
            index_query: self.index_query.clone(),
            scan_query: self.scan_query.clone(),
            written: 0,
        })
    }

    /// Rebuild this prefix's rows of `raster_pyramids` from the metadata.
    pub async fn update_raster_pyramids(&self) -> RasterResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_err("BEGIN TRANSACTION failed"))?;

        sqlx::query(&format!("DELETE FROM {} WHERE table_prefix = ?", PYRAMIDS_TABLE))
            .bind(&self.names.prefix)
            .execute(&mut *tx)
            .await
            .map_err(store_err("Catalogue delete failed"))?;

        sqlx::query(&format!(
            "INSERT INTO {} (table_prefix, pixel_x_size, pixel_y_size, tile_count) \
             SELECT ?, pixel_x_size, pixel_y_size, COUNT(*) FROM {} \
             WHERE pixel_x_size > 0 AND pixel_y_size > 0 \
             GROUP BY pixel_x_size, pixel_y_size",
            PYRAMIDS_TABLE, self.names.metadata
        ))
        .bind(&self.names.prefix)
        .execute(&mut *tx)
        .await
        .map_err(store_err("Catalogue insert failed"))?;

        tx.commit().await.map_err(store_err("COMMIT failed"))?;
        debug!(prefix = %self.names.prefix, "Updated raster_pyramids");
        Ok(())
    }

    /// Drop and recreate the pixel-size index.
    pub async fn refresh_resolution_index(&self) -> RasterResult<()> {
        sqlx::query(&format!("DROP INDEX IF EXISTS {}", quote_ident(RESOLUTION_INDEX)))
            .execute(&self.pool)
            .await
            .map_err(store_err("DROP INDEX failed"))?;
        sqlx::query(&format!(
            "CREATE INDEX {} ON {} (pixel_x_size, pixel_y_size)",
            quote_ident(RESOLUTION_INDEX),
            self.names.metadata
        ))
        .execute(&self.pool)
        .await
        .map_err(store_err("CREATE INDEX failed"))?;
        Ok(())
    }

    /// Refresh both the level catalogue and the resolution index.
    pub async fn refresh_catalogue(&self) -> RasterResult<()> {
        self.update_raster_pyramids().await?;
        self.refresh_resolution_index().await
    }

    /// Repopulate the R*Tree from the metadata columns.
    pub async fn rebuild_spatial_index(&self) -> RasterResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_err("BEGIN TRANSACTION failed"))?;
        sqlx::query(&format!("DELETE FROM {}", self.names.spatial_index))
            .execute(&mut *tx)
            .await
            .map_err(store_err("Spatial index clear failed"))?;
        sqlx::query(&format!(
            "INSERT INTO {} (pkid, xmin, xmax, ymin, ymax) \
             SELECT id, min_x, max_x, min_y, max_y FROM {}",
            self.names.spatial_index, self.names.metadata
        ))
        .execute(&mut *tx)
        .await
        .map_err(store_err("Spatial index fill failed"))?;
        tx.commit().await.map_err(store_err("COMMIT failed"))?;
        Ok(())
    }

    pub async fn sqlite_version(&self) -> RasterResult<String> {
        sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("Version query failed"))
    }
}

/// Transactional tile writer. Dropping it without [`TileWriter::commit`]
/// rolls back every write.
///
/// The store holds a single connection, so reads that must happen while a
/// writer is open go through the writer's own read methods.
pub struct TileWriter {
    tx: Transaction<'static, Sqlite>,
    names: TableNames,
    index_query: String,
    scan_query: String,
    written: usize,
}

impl TileWriter {
    /// Insert the raster blob, then its metadata under the same id.
    pub async fn insert_tile(&mut self, tile: &NewTile<'_>) -> RasterResult<i64> {
        let id = sqlx::query(&format!("INSERT INTO {} (raster) VALUES (?)", self.names.rasters))
            .bind(tile.raster)
            .execute(&mut *self.tx)
            .await
            .map_err(store_err("Raster insert failed"))?
            .last_insert_rowid();

        sqlx::query(&format!(
            "INSERT INTO {} (id, source_name, tile_id, width, height, \
             pixel_x_size, pixel_y_size, geometry, min_x, min_y, max_x, max_y, srid) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.names.metadata
        ))
        .bind(id)
        .bind(tile.source_name)
        .bind(tile.tile_id)
        .bind(tile.width as i64)
        .bind(tile.height as i64)
        .bind(tile.pixel_x_size)
        .bind(tile.pixel_y_size)
        .bind(wkb::encode_bbox(&tile.bbox))
        .bind(tile.bbox.min_x)
        .bind(tile.bbox.min_y)
        .bind(tile.bbox.max_x)
        .bind(tile.bbox.max_y)
        .bind(tile.srid)
        .execute(&mut *self.tx)
        .await
        .map_err(store_err("Metadata insert failed"))?;

        self.written += 1;
        Ok(id)
    }

    /// Delete every tile coarser than `(px, py)` on both axes.
    pub async fn delete_coarser_than(&mut self, px: f64, py: f64) -> RasterResult<u64> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE id IN (SELECT id FROM {} \
             WHERE pixel_x_size > ? AND pixel_y_size > ?)",
            self.names.rasters, self.names.metadata
        ))
        .bind(px)
        .bind(py)
        .execute(&mut *self.tx)
        .await
        .map_err(store_err("Raster purge failed"))?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE pixel_x_size > ? AND pixel_y_size > ?",
            self.names.metadata
        ))
        .bind(px)
        .bind(py)
        .execute(&mut *self.tx)
        .await
        .map_err(store_err("Metadata purge failed"))?
        .rows_affected();
        Ok(deleted)
    }

    /// [`RasterStore::tiles_in_window`] inside this transaction.
    pub async fn tiles_in_window(
        &mut self,
        window: &BoundingBox,
        px: f64,
        py: f64,
        strategy: AccessStrategy,
    ) -> RasterResult<Vec<StoredTile>> {
        let sql = match strategy {
            AccessStrategy::SpatialIndex => &self.index_query,
            AccessStrategy::Scan => &self.scan_query,
        };
        fetch_tiles(&mut *self.tx, sql, window, px, py).await
    }

    /// [`RasterStore::source_footprints`] inside this transaction.
    pub async fn source_footprints(
        &mut self,
        source_name: &str,
        px: f64,
        py: f64,
    ) -> RasterResult<FootprintStore> {
        fetch_footprints(&mut *self.tx, &self.names, source_name, px, py).await
    }

    pub async fn tile_blob(&mut self, id: i64) -> RasterResult<Vec<u8>> {
        fetch_blob(&mut *self.tx, &self.names, id).await
    }

    /// Tiles inserted so far in this transaction.
    pub fn written(&self) -> usize {
        self.written
    }

    pub async fn commit(self) -> RasterResult<usize> {
        self.tx.commit().await.map_err(store_err("COMMIT failed"))?;
        Ok(self.written)
    }

    pub async fn rollback(self) -> RasterResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(store_err("ROLLBACK failed"))
    }
}
