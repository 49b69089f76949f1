//! Shapefile encoder.
//!
//! A shapefile layer holds exactly one geometry class, so the collection
//! is classified first and a mixed set is rejected. The `.shp`/`.shx`/
//! `.dbf` companions are written into a temp directory, a WGS84 `.prj`
//! is added, and the four files are delivered as one zip archive.

use std::io::Write;

use geo::Geometry;
use shapefile::dbase;
use vector_extract_models::{Record, RecordCollection};

use crate::{ColumnType, EncodeError, infer_column_types};

/// ESRI-style WGS84 projection definition for the `.prj` companion.
const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
UNIT[\"Degree\",0.0174532925199433]]";

/// Shapefile geometry classes. One per layer, no mixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeClass {
    Point,
    Multipoint,
    Polyline,
    Polygon,
}

impl ShapeClass {
    fn of(geometry: &Geometry<f64>) -> Result<Self, EncodeError> {
        match geometry {
            Geometry::Point(_) => Ok(Self::Point),
            Geometry::MultiPoint(_) => Ok(Self::Multipoint),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Ok(Self::Polyline)
            }
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_)
            | Geometry::Triangle(_) => Ok(Self::Polygon),
            Geometry::GeometryCollection(_) => Err(EncodeError::Geometry {
                message: "geometry collections cannot be written to a shapefile".to_string(),
            }),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Multipoint => "multipoint",
            Self::Polyline => "polyline",
            Self::Polygon => "polygon",
        }
    }
}

/// Encodes the collection as a zipped shapefile set
/// (`.shp`/`.shx`/`.dbf`/`.prj`).
///
/// Records without geometry are skipped (a shapefile record is a shape);
/// the skip count is logged.
///
/// # Errors
///
/// Returns [`EncodeError::MixedGeometry`] when records carry more than
/// one geometry class, [`EncodeError::Geometry`] when no record has a
/// geometry at all or a shape cannot be converted, and
/// [`EncodeError::Shapefile`] / [`EncodeError::Zip`] /
/// [`EncodeError::Io`] on writer failures.
pub fn encode_shapefile(
    collection: &RecordCollection,
    layer_name: &str,
) -> Result<Vec<u8>, EncodeError> {
    let with_geometry: Vec<&Record> = collection
        .records
        .iter()
        .filter(|record| record.geometry.is_some())
        .collect();
    let skipped = collection.len() - with_geometry.len();
    if skipped > 0 {
        log::warn!("Skipping {skipped} record(s) without geometry for shapefile export");
    }

    let class = layer_class(&with_geometry)?;

    let columns = infer_column_types(collection);
    let dbf_fields = dbf_field_plan(&columns);

    let staging = tempfile::TempDir::new()?;
    let shp_path = staging.path().join(format!("{layer_name}.shp"));
    write_companions(&shp_path, class, &with_geometry, &dbf_fields)?;
    std::fs::write(staging.path().join(format!("{layer_name}.prj")), WGS84_PRJ)?;

    let mut archive = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for extension in ["shp", "shx", "dbf", "prj"] {
        let file_path = staging.path().join(format!("{layer_name}.{extension}"));
        archive.start_file(format!("{layer_name}.{extension}"), options)?;
        archive.write_all(&std::fs::read(&file_path)?)?;
    }
    Ok(archive.finish()?.into_inner())
}

/// The single geometry class of the layer, or the mixed-set error.
fn layer_class(records: &[&Record]) -> Result<ShapeClass, EncodeError> {
    let mut class: Option<ShapeClass> = None;
    for record in records {
        let Some(geometry) = record.geometry.as_ref() else {
            continue;
        };
        let current = ShapeClass::of(geometry)?;
        match class {
            None => class = Some(current),
            Some(existing) if existing != current => {
                return Err(EncodeError::MixedGeometry {
                    found: format!("{} and {}", existing.name(), current.name()),
                });
            }
            Some(_) => {}
        }
    }
    class.ok_or_else(|| EncodeError::Geometry {
        message: "shapefile export needs at least one record with geometry".to_string(),
    })
}

/// A union-schema column mapped to a DBF field.
struct DbfField {
    column: String,
    /// DBF field names are limited to 10 bytes; truncated and uniquified.
    dbf_name: String,
    column_type: ColumnType,
}

fn dbf_field_plan(columns: &[(String, ColumnType)]) -> Vec<DbfField> {
    let mut used: Vec<String> = Vec::new();
    columns
        .iter()
        .map(|(column, column_type)| {
            let mut name: String = column.chars().take(10).collect();
            let mut counter = 1;
            while used.iter().any(|u| u == &name) {
                let suffix = format!("_{counter}");
                let keep = 10 - suffix.len();
                name = column.chars().take(keep).collect::<String>() + &suffix;
                counter += 1;
            }
            used.push(name.clone());
            DbfField {
                column: column.clone(),
                dbf_name: name,
                column_type: *column_type,
            }
        })
        .collect()
}

fn shapefile_error(e: impl std::fmt::Display) -> EncodeError {
    EncodeError::Shapefile {
        message: e.to_string(),
    }
}

fn write_companions(
    shp_path: &std::path::Path,
    class: ShapeClass,
    records: &[&Record],
    fields: &[DbfField],
) -> Result<(), EncodeError> {
    let mut table = dbase::TableWriterBuilder::new();
    for field in fields {
        let name = dbase::FieldName::try_from(field.dbf_name.as_str()).map_err(|e| {
            EncodeError::Shapefile {
                message: format!("invalid DBF field name {:?}: {e:?}", field.dbf_name),
            }
        })?;
        table = match field.column_type {
            ColumnType::Integer => table.add_numeric_field(name, 20, 0),
            ColumnType::Real => table.add_numeric_field(name, 24, 6),
            ColumnType::Boolean => table.add_logical_field(name),
            ColumnType::Text => table.add_character_field(name, 254),
        };
    }

    let mut writer = shapefile::Writer::from_path(shp_path, table).map_err(shapefile_error)?;
    for record in records {
        let Some(geometry) = record.geometry.as_ref() else {
            continue;
        };
        let attributes = dbf_record(record, fields);
        match class {
            ShapeClass::Point => {
                writer.write_shape_and_record(&to_point(geometry)?, &attributes)
            }
            ShapeClass::Multipoint => {
                writer.write_shape_and_record(&to_multipoint(geometry)?, &attributes)
            }
            ShapeClass::Polyline => {
                writer.write_shape_and_record(&to_polyline(geometry)?, &attributes)
            }
            ShapeClass::Polygon => {
                writer.write_shape_and_record(&to_polygon(geometry)?, &attributes)
            }
        }
        .map_err(shapefile_error)?;
    }
    Ok(())
}

fn dbf_record(record: &Record, fields: &[DbfField]) -> dbase::Record {
    let mut out = dbase::Record::default();
    for field in fields {
        let value = record.attr(&field.column);
        let field_value = match field.column_type {
            ColumnType::Integer | ColumnType::Real => {
                dbase::FieldValue::Numeric(value.and_then(serde_json::Value::as_f64))
            }
            ColumnType::Boolean => {
                dbase::FieldValue::Logical(value.and_then(serde_json::Value::as_bool))
            }
            ColumnType::Text => dbase::FieldValue::Character(match value {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(s)) => Some(truncate(s, 254)),
                Some(other) => Some(truncate(&other.to_string(), 254)),
            }),
        };
        out.insert(field.dbf_name.clone(), field_value);
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn shp_point(coord: geo::Coord<f64>) -> shapefile::Point {
    shapefile::Point::new(coord.x, coord.y)
}

fn to_point(geometry: &Geometry<f64>) -> Result<shapefile::Point, EncodeError> {
    match geometry {
        Geometry::Point(p) => Ok(shapefile::Point::new(p.x(), p.y())),
        other => Err(unexpected_class(other, "point")),
    }
}

fn to_multipoint(geometry: &Geometry<f64>) -> Result<shapefile::Multipoint, EncodeError> {
    match geometry {
        Geometry::MultiPoint(mp) => {
            if mp.0.is_empty() {
                return Err(EncodeError::Geometry {
                    message: "multipoint with no points".to_string(),
                });
            }
            Ok(shapefile::Multipoint::new(
                mp.iter().map(|p| shp_point(p.0)).collect(),
            ))
        }
        other => Err(unexpected_class(other, "multipoint")),
    }
}

fn to_polyline(geometry: &Geometry<f64>) -> Result<shapefile::Polyline, EncodeError> {
    let parts: Vec<Vec<shapefile::Point>> = match geometry {
        Geometry::LineString(line) => vec![line.coords().copied().map(shp_point).collect()],
        Geometry::MultiLineString(lines) => lines
            .iter()
            .map(|line| line.coords().copied().map(shp_point).collect())
            .collect(),
        Geometry::Line(line) => vec![vec![shp_point(line.start), shp_point(line.end)]],
        other => return Err(unexpected_class(other, "polyline")),
    };
    // The shapefile writer panics on degenerate parts; reject them here.
    if parts.is_empty() {
        return Err(EncodeError::Geometry {
            message: "polyline with no parts".to_string(),
        });
    }
    if parts.iter().any(|part| part.len() < 2) {
        return Err(EncodeError::Geometry {
            message: "polyline part with fewer than 2 points".to_string(),
        });
    }
    Ok(shapefile::Polyline::with_parts(parts))
}

fn to_polygon(geometry: &Geometry<f64>) -> Result<shapefile::Polygon, EncodeError> {
    let polygons: Vec<geo::Polygon<f64>> = match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        other => return Err(unexpected_class(other, "polygon")),
    };

    if polygons.is_empty() {
        return Err(EncodeError::Geometry {
            message: "polygon with no rings".to_string(),
        });
    }

    let mut rings = Vec::new();
    for polygon in &polygons {
        let exterior: Vec<shapefile::Point> =
            polygon.exterior().coords().copied().map(shp_point).collect();
        if exterior.len() < 4 {
            return Err(EncodeError::Geometry {
                message: "polygon ring with fewer than 4 points".to_string(),
            });
        }
        rings.push(shapefile::PolygonRing::Outer(exterior));
        for interior in polygon.interiors() {
            rings.push(shapefile::PolygonRing::Inner(
                interior.coords().copied().map(shp_point).collect(),
            ));
        }
    }
    Ok(shapefile::Polygon::with_rings(rings))
}

fn unexpected_class(geometry: &Geometry<f64>, expected: &str) -> EncodeError {
    EncodeError::Geometry {
        message: format!("expected a {expected} geometry, found {geometry:?}"),
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use serde_json::json;

    use super::*;

    fn point_collection() -> RecordCollection {
        let mut a = serde_json::Map::new();
        a.insert("name".to_string(), json!("A"));
        a.insert("height".to_string(), json!(12));
        let mut b = serde_json::Map::new();
        b.insert("name".to_string(), json!("B"));
        b.insert("height".to_string(), json!(7));
        RecordCollection::new(vec![
            Record::new(a, Some(Geometry::Point(Point::new(9.19, 45.46)))),
            Record::new(b, Some(Geometry::Point(Point::new(9.2, 45.5)))),
        ])
    }

    #[test]
    fn archive_contains_the_four_companion_files() {
        let bytes = encode_shapefile(&point_collection(), "sites").unwrap();
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["sites.dbf", "sites.prj", "sites.shp", "sites.shx"]);

        for i in 0..archive.len() {
            assert!(archive.by_index(i).unwrap().size() > 0);
        }
    }

    #[test]
    fn mixed_geometry_classes_are_rejected() {
        let line = geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let collection = RecordCollection::new(vec![
            Record::new(
                serde_json::Map::new(),
                Some(Geometry::Point(Point::new(0.0, 0.0))),
            ),
            Record::new(serde_json::Map::new(), Some(Geometry::LineString(line))),
        ]);
        let err = encode_shapefile(&collection, "broken").unwrap_err();
        assert!(matches!(err, EncodeError::MixedGeometry { .. }));
    }

    #[test]
    fn all_geometry_less_collection_is_a_conversion_error() {
        let collection =
            RecordCollection::new(vec![Record::new(serde_json::Map::new(), None)]);
        let err = encode_shapefile(&collection, "empty").unwrap_err();
        assert!(matches!(err, EncodeError::Geometry { .. }));
    }

    #[test]
    fn empty_multi_geometries_are_conversion_errors() {
        let empty: [(Geometry<f64>, &str); 3] = [
            (Geometry::MultiPoint(geo::MultiPoint(vec![])), "multipoint"),
            (
                Geometry::MultiLineString(geo::MultiLineString(vec![])),
                "multilinestring",
            ),
            (Geometry::MultiPolygon(geo::MultiPolygon(vec![])), "multipolygon"),
        ];
        for (geometry, label) in empty {
            let collection = RecordCollection::new(vec![Record::new(
                serde_json::Map::new(),
                Some(geometry),
            )]);
            let err = encode_shapefile(&collection, label).unwrap_err();
            assert!(matches!(err, EncodeError::Geometry { .. }), "{label}");
        }
    }

    #[test]
    fn long_column_names_are_truncated_and_uniquified() {
        let columns = vec![
            ("very_long_column_one".to_string(), ColumnType::Text),
            ("very_long_column_two".to_string(), ColumnType::Text),
        ];
        let plan = dbf_field_plan(&columns);
        assert_eq!(plan[0].dbf_name, "very_long_");
        assert_eq!(plan[1].dbf_name, "very_lon_1");
        assert!(plan.iter().all(|f| f.dbf_name.len() <= 10));
    }
}
