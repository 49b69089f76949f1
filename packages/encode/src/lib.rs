#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stateless format converters.
//!
//! Each target format gets one converter that turns a [`RecordCollection`]
//! into an in-memory byte buffer. Multi-file formats (Shapefile) stage
//! their companion files in a [`tempfile::TempDir`] — dropped on every
//! exit path — and deliver a single zip archive.

pub mod geo_json;
pub mod gpkg;
pub mod shp;
pub mod tabular;

use serde_json::Value;
use vector_extract_models::{Download, OutputFormat, RecordCollection};

/// Errors raised by the encoding stage.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// CSV serialization failed.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel workbook construction failed.
    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// `GeoPackage` SQLite operation failed.
    #[error("GeoPackage write error: {0}")]
    Gpkg(#[from] rusqlite::Error),

    /// Shapefile writing failed.
    #[error("Shapefile write error: {message}")]
    Shapefile {
        /// The underlying writer failure.
        message: String,
    },

    /// The target format rejects the collection's geometry set.
    #[error("shapefiles hold a single geometry type per layer, found {found}")]
    MixedGeometry {
        /// Description of the offending mix.
        found: String,
    },

    /// A geometry could not be converted to the target representation.
    #[error("geometry conversion failed: {message}")]
    Geometry {
        /// What failed to convert.
        message: String,
    },

    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive packaging failed.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Temp-file or buffer I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// SQL/DBF column types inferred from the attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// All non-null values are integral numbers.
    Integer,
    /// All non-null values are numbers, at least one fractional.
    Real,
    /// All non-null values are booleans.
    Boolean,
    /// Anything else (strings, mixed, nested values, all-null).
    Text,
}

/// Infers a column type for each union-schema field by scanning the
/// non-null values it takes across the collection.
#[must_use]
pub fn infer_column_types(collection: &RecordCollection) -> Vec<(String, ColumnType)> {
    collection
        .field_names()
        .into_iter()
        .map(|name| {
            let column_type = column_type_of(collection, &name);
            (name, column_type)
        })
        .collect()
}

fn column_type_of(collection: &RecordCollection, field: &str) -> ColumnType {
    let mut seen: Option<ColumnType> = None;
    for record in &collection.records {
        let value = match record.attr(field) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };
        let current = match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Real,
            Value::Bool(_) => ColumnType::Boolean,
            _ => return ColumnType::Text,
        };
        seen = Some(match (seen, current) {
            (None, c) => c,
            (Some(prev), c) if prev == c => c,
            (Some(ColumnType::Integer), ColumnType::Real)
            | (Some(ColumnType::Real), ColumnType::Integer) => ColumnType::Real,
            _ => return ColumnType::Text,
        });
    }
    seen.unwrap_or(ColumnType::Text)
}

/// Normalizes a user-supplied layer name into something safe for
/// filenames and table names.
#[must_use]
pub fn sanitize_layer_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        "layer".to_string()
    } else {
        cleaned
    }
}

/// Encodes `collection` into `format`, producing the download artifact.
///
/// # Errors
///
/// Returns [`EncodeError`] when the converter fails; in particular
/// [`EncodeError::MixedGeometry`] when a strict format rejects the
/// geometry set.
pub fn encode(
    collection: &RecordCollection,
    format: OutputFormat,
    layer_name: &str,
) -> Result<Download, EncodeError> {
    let name = sanitize_layer_name(layer_name);
    let bytes = match format {
        OutputFormat::GeoJson => geo_json::encode_geojson(collection)?,
        OutputFormat::GeoPackage => gpkg::encode_geopackage(collection, &name)?,
        OutputFormat::Shapefile => shp::encode_shapefile(collection, &name)?,
        OutputFormat::Csv => tabular::encode_csv(collection)?,
        OutputFormat::Xlsx => tabular::encode_xlsx(collection)?,
    };
    log::info!(
        "Encoded {} record(s) as {format} ({} bytes)",
        collection.len(),
        bytes.len()
    );
    Ok(Download::new(&name, format, bytes))
}
