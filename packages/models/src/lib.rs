#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the vector extraction pipeline.
//!
//! Every source wrapping (`GeoJSON`, `ArcGIS` feature sets, flat lat/lon
//! lists, ...) is normalized into [`RecordCollection`] before filtering and
//! encoding. All downstream stages operate on this one shape.

use geo::Geometry;
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A single normalized feature: an ordered attribute map plus an optional
/// geometry.
///
/// Attributes keep their source order (`serde_json` is built with
/// `preserve_order`). Geometry is `None` for records that carry tabular
/// data only.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Attribute name -> scalar (or nested) value.
    pub attributes: Map<String, Value>,
    /// WGS84 geometry, if the record has one.
    pub geometry: Option<Geometry<f64>>,
}

impl Record {
    /// Creates a record from an attribute map and optional geometry.
    #[must_use]
    pub const fn new(attributes: Map<String, Value>, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    /// Looks up an attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// An ordered sequence of [`Record`]s sharing a best-effort common schema.
///
/// Fields absent on a given record are treated as null by the filtering and
/// encoding stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCollection {
    /// The normalized records, in source order.
    pub records: Vec<Record>,
}

impl RecordCollection {
    /// Creates a collection from already-normalized records.
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of records in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Union of attribute names across all records, in first-seen order.
    ///
    /// This is the column set for tabular encoders and the known-field set
    /// for attribute-filter validation.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in &self.records {
            for key in record.attributes.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}

/// A rectangular WGS84 extent used as an inclusive spatial predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge (degrees longitude).
    pub min_lon: f64,
    /// Southern edge (degrees latitude).
    pub min_lat: f64,
    /// Eastern edge (degrees longitude).
    pub max_lon: f64,
    /// Northern edge (degrees latitude).
    pub max_lat: f64,
}

/// Rejected bounding-box input (out of WGS84 range or inverted).
#[derive(Debug, thiserror::Error)]
#[error("invalid bounding box: {reason}")]
pub struct InvalidBoundingBox {
    /// What made the box invalid.
    pub reason: String,
}

impl BoundingBox {
    /// Validates and constructs a WGS84 bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBox`] if any coordinate is outside the
    /// WGS84 range or a minimum exceeds its maximum.
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, InvalidBoundingBox> {
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            return Err(InvalidBoundingBox {
                reason: "longitude must be within [-180, 180]".to_string(),
            });
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(InvalidBoundingBox {
                reason: "latitude must be within [-90, 90]".to_string(),
            });
        }
        if min_lon > max_lon {
            return Err(InvalidBoundingBox {
                reason: format!("min longitude {min_lon} exceeds max longitude {max_lon}"),
            });
        }
        if min_lat > max_lat {
            return Err(InvalidBoundingBox {
                reason: format!("min latitude {min_lat} exceeds max latitude {max_lat}"),
            });
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// Supported output encodings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum OutputFormat {
    /// Standard `GeoJSON` FeatureCollection.
    #[strum(serialize = "geojson")]
    GeoJson,
    /// `GeoPackage` single-file SQLite container.
    #[strum(serialize = "gpkg", serialize = "geopackage", to_string = "gpkg")]
    GeoPackage,
    /// ESRI Shapefile, delivered as a zip of its companion files.
    #[strum(serialize = "shp", serialize = "shapefile", to_string = "shp")]
    Shapefile,
    /// UTF-8 CSV with a WKT geometry column.
    #[strum(serialize = "csv")]
    Csv,
    /// Excel workbook with a WKT geometry column.
    #[strum(serialize = "xlsx", serialize = "excel", to_string = "xlsx")]
    Xlsx,
}

impl OutputFormat {
    /// File extension of the delivered artifact (including the zip wrapper
    /// for multi-file formats).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::GeoPackage => "gpkg",
            Self::Shapefile => "zip",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// MIME type of the delivered artifact.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::GeoJson => "application/geo+json",
            Self::GeoPackage => "application/geopackage+sqlite3",
            Self::Shapefile => "application/zip",
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// `true` if the format is delivered as a compressed archive of
    /// companion files rather than a single file.
    #[must_use]
    pub const fn is_archive(self) -> bool {
        matches!(self, Self::Shapefile)
    }
}

/// A completed download artifact: the encoded bytes plus the metadata the
/// delivery layer needs.
#[derive(Debug, Clone)]
pub struct Download {
    /// Suggested filename (layer name + format extension).
    pub filename: String,
    /// MIME type for the download.
    pub content_type: &'static str,
    /// The encoded payload.
    pub bytes: Vec<u8>,
}

impl Download {
    /// Builds a download artifact for `layer_name` in `format`.
    #[must_use]
    pub fn new(layer_name: &str, format: OutputFormat, bytes: Vec<u8>) -> Self {
        Self {
            filename: format!("{layer_name}.{}", format.extension()),
            content_type: format.content_type(),
            bytes,
        }
    }
}
