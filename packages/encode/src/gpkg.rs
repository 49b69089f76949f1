//! `GeoPackage` encoder.
//!
//! Writes a minimal feature `GeoPackage`: the three mandatory metadata
//! tables plus one feature table whose `geom` column holds
//! `GeoPackage`-binary blobs (GP header, little-endian, no envelope,
//! SRS 4326, followed by standard WKB). The database is staged on a temp
//! path and read back into memory for delivery.

use geo::{BoundingRect, Geometry, Rect};
use geozero::{CoordDimensions, ToWkb};
use rusqlite::Connection;
use serde_json::Value;
use vector_extract_models::RecordCollection;

use crate::{ColumnType, EncodeError, infer_column_types};

/// WGS84 definition for `gpkg_spatial_ref_sys`.
const WGS84_WKT: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",\
    SPHEROID[\"WGS 84\",6378137,298.257223563]],\
    PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]";

/// Mandatory `GeoPackage` metadata tables and the standard SRS rows.
const GPKG_SCHEMA: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
  srs_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL PRIMARY KEY,
  organization TEXT NOT NULL,
  organization_coordsys_id INTEGER NOT NULL,
  definition TEXT NOT NULL,
  description TEXT
);
CREATE TABLE gpkg_contents (
  table_name TEXT NOT NULL PRIMARY KEY,
  data_type TEXT NOT NULL,
  identifier TEXT UNIQUE,
  description TEXT DEFAULT '',
  last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  min_x DOUBLE,
  min_y DOUBLE,
  max_x DOUBLE,
  max_y DOUBLE,
  srs_id INTEGER,
  CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
  table_name TEXT NOT NULL,
  column_name TEXT NOT NULL,
  geometry_type_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL,
  z TINYINT NOT NULL,
  m TINYINT NOT NULL,
  CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
);
INSERT INTO gpkg_spatial_ref_sys VALUES
  ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
  ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
";

/// Encodes the collection as a single-layer `GeoPackage`.
///
/// # Errors
///
/// Returns [`EncodeError::Gpkg`] on SQLite failure,
/// [`EncodeError::Geometry`] when a geometry cannot be encoded as WKB,
/// and [`EncodeError::Io`] on temp-file failure.
pub fn encode_geopackage(
    collection: &RecordCollection,
    layer_name: &str,
) -> Result<Vec<u8>, EncodeError> {
    // Staged on disk because SQLite owns the file format; the TempDir
    // guard removes it on every exit path.
    let staging = tempfile::TempDir::new()?;
    let path = staging.path().join(format!("{layer_name}.gpkg"));

    let conn = Connection::open(&path)?;
    conn.pragma_update(None, "application_id", 0x4750_4B47_i64)?;
    conn.pragma_update(None, "user_version", 10300_i64)?;
    conn.execute_batch(GPKG_SCHEMA)?;
    conn.execute(
        "INSERT INTO gpkg_spatial_ref_sys VALUES ('WGS 84 geodetic', 4326, 'EPSG', 4326, ?1, 'WGS 84')",
        [WGS84_WKT],
    )?;

    let columns = infer_column_types(collection);
    create_feature_table(&conn, layer_name, &columns)?;
    insert_features(&conn, collection, layer_name, &columns)?;
    register_layer(&conn, collection, layer_name)?;

    conn.close().map_err(|(_, e)| e)?;
    Ok(std::fs::read(&path)?)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_feature_table(
    conn: &Connection,
    layer_name: &str,
    columns: &[(String, ColumnType)],
) -> Result<(), EncodeError> {
    let mut ddl = format!(
        "CREATE TABLE {} (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB",
        quote_ident(layer_name)
    );
    for (name, column_type) in columns {
        let sql_type = match column_type {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        };
        ddl.push_str(&format!(", {} {sql_type}", quote_ident(name)));
    }
    ddl.push(')');
    conn.execute(&ddl, [])?;
    Ok(())
}

fn insert_features(
    conn: &Connection,
    collection: &RecordCollection,
    layer_name: &str,
    columns: &[(String, ColumnType)],
) -> Result<(), EncodeError> {
    let column_list: Vec<String> = std::iter::once("geom".to_string())
        .chain(columns.iter().map(|(name, _)| quote_ident(name)))
        .collect();
    let placeholders: Vec<String> = (1..=column_list.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(layer_name),
        column_list.join(", "),
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;

    for record in &collection.records {
        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(column_list.len());
        params.push(match &record.geometry {
            Some(geometry) => rusqlite::types::Value::Blob(gpkg_geometry_blob(geometry)?),
            None => rusqlite::types::Value::Null,
        });
        for (name, _) in columns {
            params.push(sql_value(record.attr(name)));
        }
        stmt.execute(rusqlite::params_from_iter(params))?;
    }
    Ok(())
}

fn sql_value(value: Option<&Value>) -> rusqlite::types::Value {
    match value {
        None | Some(Value::Null) => rusqlite::types::Value::Null,
        Some(Value::Bool(b)) => rusqlite::types::Value::Integer(i64::from(*b)),
        Some(Value::Number(n)) => n.as_i64().map_or_else(
            || rusqlite::types::Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            rusqlite::types::Value::Integer,
        ),
        Some(Value::String(s)) => rusqlite::types::Value::Text(s.clone()),
        // Nested arrays/objects are kept as JSON text.
        Some(nested) => rusqlite::types::Value::Text(nested.to_string()),
    }
}

fn register_layer(
    conn: &Connection,
    collection: &RecordCollection,
    layer_name: &str,
) -> Result<(), EncodeError> {
    let extent = collection_extent(collection);
    conn.execute(
        "INSERT INTO gpkg_contents
           (table_name, data_type, identifier, srs_id, min_x, min_y, max_x, max_y)
         VALUES (?1, 'features', ?1, 4326, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            layer_name,
            extent.map(|r| r.min().x),
            extent.map(|r| r.min().y),
            extent.map(|r| r.max().x),
            extent.map(|r| r.max().y),
        ],
    )?;
    conn.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', 'GEOMETRY', 4326, 0, 0)",
        [layer_name],
    )?;
    Ok(())
}

/// Union of all record envelopes, if any record has a geometry.
fn collection_extent(collection: &RecordCollection) -> Option<Rect<f64>> {
    let mut extent: Option<Rect<f64>> = None;
    for record in &collection.records {
        let Some(rect) = record.geometry.as_ref().and_then(|g| g.bounding_rect()) else {
            continue;
        };
        extent = Some(extent.map_or(rect, |acc| {
            Rect::new(
                geo::coord! {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::coord! {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        }));
    }
    extent
}

/// `GeoPackage` binary header (GP, version 0, little-endian flags, no
/// envelope, SRS 4326) followed by standard WKB.
fn gpkg_geometry_blob(geometry: &Geometry<f64>) -> Result<Vec<u8>, EncodeError> {
    let wkb = geometry
        .to_wkb(CoordDimensions::xy())
        .map_err(|e| EncodeError::Geometry {
            message: format!("WKB conversion failed: {e}"),
        })?;
    let mut blob = Vec::with_capacity(wkb.len() + 8);
    blob.extend_from_slice(b"GP");
    blob.push(0);
    blob.push(0b0000_0001);
    blob.extend_from_slice(&4326_i32.to_le_bytes());
    blob.extend_from_slice(&wkb);
    Ok(blob)
}
