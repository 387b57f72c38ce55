//! Table layout of a raster store.
//!
//! Every raster table prefix owns three objects plus the shared catalogue:
//!
//! ```text
//! "<p>_rasters"                  id, raster BLOB
//! "<p>_metadata"                 id, source_name, tile_id, width, height,
//!                                pixel_x_size, pixel_y_size, geometry (WKB),
//!                                min_x, min_y, max_x, max_y, srid
//! "idx_<p>_metadata_geometry"    R*Tree over the footprint MBRs
//! raster_pyramids                table_prefix, pixel_x_size, pixel_y_size, tile_count
//! ```

/// Name of the per-database level catalogue.
pub const PYRAMIDS_TABLE: &str = "raster_pyramids";

/// Index over stored pixel sizes, rebuilt after every bulk write.
pub const RESOLUTION_INDEX: &str = "idx_resolution";

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column list shared by both tile query shapes.
const TILE_COLUMNS: &str = "m.id, m.tile_id, m.srid, m.width, m.height, \
     m.min_x, m.min_y, m.max_x, m.max_y, r.raster";

/// Fully quoted names derived from a table prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub prefix: String,
    pub rasters: String,
    pub metadata: String,
    pub spatial_index: String,
    insert_trigger: String,
    delete_trigger: String,
}

impl TableNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            rasters: quote_ident(&format!("{}_rasters", prefix)),
            metadata: quote_ident(&format!("{}_metadata", prefix)),
            spatial_index: quote_ident(&format!("idx_{}_metadata_geometry", prefix)),
            insert_trigger: quote_ident(&format!("gii_{}_metadata", prefix)),
            delete_trigger: quote_ident(&format!("gid_{}_metadata", prefix)),
        }
    }

    /// Unquoted table names, as listed in `sqlite_master`.
    pub fn raw_rasters(&self) -> String {
        format!("{}_rasters", self.prefix)
    }

    pub fn raw_metadata(&self) -> String {
        format!("{}_metadata", self.prefix)
    }

    /// `CREATE` statements for a fresh store; each is idempotent.
    pub fn create_statements(&self) -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    table_prefix TEXT NOT NULL,
                    pixel_x_size DOUBLE NOT NULL,
                    pixel_y_size DOUBLE NOT NULL,
                    tile_count INTEGER NOT NULL
                )",
                PYRAMIDS_TABLE
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    raster BLOB NOT NULL
                )",
                self.rasters
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY,
                    source_name TEXT NOT NULL,
                    tile_id INTEGER NOT NULL,
                    width INTEGER NOT NULL,
                    height INTEGER NOT NULL,
                    pixel_x_size DOUBLE NOT NULL,
                    pixel_y_size DOUBLE NOT NULL,
                    geometry BLOB NOT NULL,
                    min_x DOUBLE NOT NULL,
                    min_y DOUBLE NOT NULL,
                    max_x DOUBLE NOT NULL,
                    max_y DOUBLE NOT NULL,
                    srid INTEGER NOT NULL
                )",
                self.metadata
            ),
            format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING rtree(pkid, xmin, xmax, ymin, ymax)",
                self.spatial_index
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {} AFTER INSERT ON {}
                 BEGIN
                    INSERT INTO {} (pkid, xmin, xmax, ymin, ymax)
                    VALUES (NEW.id, NEW.min_x, NEW.max_x, NEW.min_y, NEW.max_y);
                 END",
                self.insert_trigger, self.metadata, self.spatial_index
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {} AFTER DELETE ON {}
                 BEGIN
                    DELETE FROM {} WHERE pkid = OLD.id;
                 END",
                self.delete_trigger, self.metadata, self.spatial_index
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (source_name)",
                quote_ident(&format!("idx_{}_source", self.prefix)),
                self.metadata
            ),
        ]
    }

    /// Tile query through the R*Tree; binds `max_x, min_x, max_y, min_y, px, py`.
    pub fn index_query(&self) -> String {
        format!(
            "SELECT {cols} FROM {meta} AS m, {rasters} AS r \
             WHERE m.id IN (SELECT pkid FROM {idx} \
                WHERE xmin < ? AND xmax > ? AND ymin < ? AND ymax > ?) \
             AND m.pixel_x_size = ? AND m.pixel_y_size = ? AND r.id = m.id \
             ORDER BY m.id",
            cols = TILE_COLUMNS,
            meta = self.metadata,
            rasters = self.rasters,
            idx = self.spatial_index
        )
    }

    /// Tile query by MBR predicate; binds `max_x, min_x, max_y, min_y, px, py`.
    pub fn scan_query(&self) -> String {
        format!(
            "SELECT {cols} FROM {meta} AS m, {rasters} AS r \
             WHERE m.min_x <= ? AND m.max_x >= ? AND m.min_y <= ? AND m.max_y >= ? \
             AND m.pixel_x_size = ? AND m.pixel_y_size = ? AND r.id = m.id \
             ORDER BY m.id",
            cols = TILE_COLUMNS,
            meta = self.metadata,
            rasters = self.rasters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_table_names() {
        let names = TableNames::new("ortho");
        assert_eq!(names.rasters, "\"ortho_rasters\"");
        assert_eq!(names.metadata, "\"ortho_metadata\"");
        assert_eq!(names.spatial_index, "\"idx_ortho_metadata_geometry\"");
        assert_eq!(names.raw_metadata(), "ortho_metadata");
    }

    #[test]
    fn test_query_shapes_bind_six_params() {
        let names = TableNames::new("t");
        assert_eq!(names.index_query().matches('?').count(), 6);
        assert_eq!(names.scan_query().matches('?').count(), 6);
    }
}
