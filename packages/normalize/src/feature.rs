//! Feature-to-record conversion.
//!
//! Handles the two member layouts that show up inside feature lists:
//! standard `GeoJSON` features (`properties` + `geometry` with a `type`
//! tag) and `ArcGIS` Esri features (`attributes` + `geometry` made of
//! `x`/`y`, `paths`, or `rings`). A plain object with neither layout is
//! kept as an attribute-only record.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, Point, Polygon};
use serde_json::{Map, Value};
use vector_extract_models::Record;

use crate::NormalizeError;

/// Converts one feature-list member into a [`Record`].
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidGeometry`] when the member carries a
/// geometry that cannot be interpreted.
pub fn feature_to_record(value: &Value) -> Result<Record, NormalizeError> {
    let Some(obj) = value.as_object() else {
        return Err(NormalizeError::InvalidGeometry {
            message: format!("feature list member is not an object: {value}"),
        });
    };

    // Esri features label their fields "attributes"; GeoJSON uses
    // "properties". Check Esri first so a featureSet payload is never
    // misread as GeoJSON.
    if let Some(attributes) = obj.get("attributes").and_then(Value::as_object) {
        let geometry = match obj.get("geometry") {
            Some(geom) if !geom.is_null() => esri_geometry(geom)?,
            _ => None,
        };
        return Ok(Record::new(attributes.clone(), geometry));
    }

    if obj.contains_key("properties") || obj.contains_key("geometry") {
        let attributes = obj
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let geometry = match obj.get("geometry") {
            Some(geom) if !geom.is_null() => Some(geojson_geometry(geom)?),
            _ => None,
        };
        return Ok(Record::new(attributes, geometry));
    }

    // Plain record object: every field is an attribute, no geometry.
    Ok(Record::new(obj.clone(), None))
}

/// Builds a point record from a flat `{lat, lon, ...}` object, or `None`
/// when either coordinate is missing, null, or non-numeric (the record is
/// dropped). The `lat`/`lon` keys are removed from the attributes.
#[must_use]
pub fn flat_point_record(obj: &Map<String, Value>) -> Option<Record> {
    let lat = obj.get("lat")?.as_f64()?;
    let lon = obj.get("lon")?.as_f64()?;

    let attributes: Map<String, Value> = obj
        .iter()
        .filter(|(key, _)| key.as_str() != "lat" && key.as_str() != "lon")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Record::new(
        attributes,
        Some(Geometry::Point(Point::new(lon, lat))),
    ))
}

/// Parses a `GeoJSON` geometry object into a [`geo::Geometry`].
fn geojson_geometry(value: &Value) -> Result<Geometry<f64>, NormalizeError> {
    let parsed: geojson::Geometry =
        serde_json::from_value(value.clone()).map_err(|e| NormalizeError::InvalidGeometry {
            message: format!("not a GeoJSON geometry: {e}"),
        })?;
    Geometry::try_from(&parsed).map_err(|e| NormalizeError::InvalidGeometry {
        message: format!("unsupported GeoJSON geometry: {e}"),
    })
}

/// Parses an Esri JSON geometry (`x`/`y` point, `points` multipoint,
/// `paths` polyline, or `rings` polygon).
///
/// A point whose `x` or `y` is null or non-numeric yields `None` — Esri
/// services emit such placeholders for unlocated features.
fn esri_geometry(value: &Value) -> Result<Option<Geometry<f64>>, NormalizeError> {
    let obj = value
        .as_object()
        .ok_or_else(|| NormalizeError::InvalidGeometry {
            message: format!("Esri geometry is not an object: {value}"),
        })?;

    if obj.contains_key("x") || obj.contains_key("y") {
        let x = obj.get("x").and_then(Value::as_f64);
        let y = obj.get("y").and_then(Value::as_f64);
        return Ok(match (x, y) {
            (Some(x), Some(y)) => Some(Geometry::Point(Point::new(x, y))),
            _ => None,
        });
    }

    if let Some(points) = obj.get("points").and_then(Value::as_array) {
        let coords: Result<Vec<Coord<f64>>, NormalizeError> =
            points.iter().map(esri_position).collect();
        let points: Vec<Point<f64>> = coords?.into_iter().map(Point::from).collect();
        return Ok(Some(Geometry::MultiPoint(MultiPoint::new(points))));
    }

    if let Some(paths) = obj.get("paths").and_then(Value::as_array) {
        let lines: Result<Vec<LineString<f64>>, NormalizeError> =
            paths.iter().map(esri_path).collect();
        return Ok(Some(Geometry::MultiLineString(MultiLineString::new(
            lines?,
        ))));
    }

    if let Some(rings) = obj.get("rings").and_then(Value::as_array) {
        let rings: Result<Vec<LineString<f64>>, NormalizeError> =
            rings.iter().map(esri_path).collect();
        let mut rings = rings?.into_iter();
        let Some(exterior) = rings.next() else {
            return Ok(None);
        };
        return Ok(Some(Geometry::Polygon(Polygon::new(
            exterior,
            rings.collect(),
        ))));
    }

    Err(NormalizeError::InvalidGeometry {
        message: format!("unrecognized Esri geometry: {value}"),
    })
}

fn esri_path(value: &Value) -> Result<LineString<f64>, NormalizeError> {
    let positions = value
        .as_array()
        .ok_or_else(|| NormalizeError::InvalidGeometry {
            message: format!("Esri path is not an array: {value}"),
        })?;
    let coords: Result<Vec<Coord<f64>>, NormalizeError> =
        positions.iter().map(esri_position).collect();
    Ok(LineString::new(coords?))
}

fn esri_position(value: &Value) -> Result<Coord<f64>, NormalizeError> {
    let pair = value.as_array().filter(|p| p.len() >= 2).ok_or_else(|| {
        NormalizeError::InvalidGeometry {
            message: format!("Esri position is not an [x, y] pair: {value}"),
        }
    })?;
    match (pair[0].as_f64(), pair[1].as_f64()) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(NormalizeError::InvalidGeometry {
            message: format!("non-numeric Esri position: {value}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn geojson_feature_keeps_properties_and_geometry() {
        let feature = json!({
            "type": "Feature",
            "properties": { "name": "A", "height": 12 },
            "geometry": { "type": "Point", "coordinates": [9.19, 45.46] }
        });
        let record = feature_to_record(&feature).unwrap();
        assert_eq!(record.attr("height"), Some(&json!(12)));
        assert!(matches!(record.geometry, Some(Geometry::Point(_))));
    }

    #[test]
    fn null_geometry_yields_attribute_only_record() {
        let feature = json!({ "properties": { "name": "A" }, "geometry": null });
        let record = feature_to_record(&feature).unwrap();
        assert!(record.geometry.is_none());
        assert_eq!(record.attr("name"), Some(&json!("A")));
    }

    #[test]
    fn esri_point_feature_maps_attributes_and_xy() {
        let feature = json!({
            "attributes": { "OBJECTID": 7, "name": "A" },
            "geometry": { "x": 9.19, "y": 45.46 }
        });
        let record = feature_to_record(&feature).unwrap();
        assert_eq!(record.attr("OBJECTID"), Some(&json!(7)));
        let Some(Geometry::Point(point)) = record.geometry else {
            panic!("expected point");
        };
        assert!((point.x() - 9.19).abs() < f64::EPSILON);
    }

    #[test]
    fn esri_null_island_placeholder_drops_geometry() {
        let feature = json!({
            "attributes": { "name": "unlocated" },
            "geometry": { "x": null, "y": null }
        });
        let record = feature_to_record(&feature).unwrap();
        assert!(record.geometry.is_none());
    }

    #[test]
    fn esri_rings_become_a_polygon_with_holes() {
        let feature = json!({
            "attributes": {},
            "geometry": {
                "rings": [
                    [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                    [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]]
                ]
            }
        });
        let record = feature_to_record(&feature).unwrap();
        let Some(Geometry::Polygon(polygon)) = record.geometry else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn esri_paths_become_a_multi_line_string() {
        let feature = json!({
            "attributes": {},
            "geometry": { "paths": [[[0.0, 0.0], [1.0, 1.0]]] }
        });
        let record = feature_to_record(&feature).unwrap();
        assert!(matches!(record.geometry, Some(Geometry::MultiLineString(_))));
    }

    #[test]
    fn malformed_geojson_geometry_is_reported() {
        let feature = json!({
            "properties": {},
            "geometry": { "type": "Point", "coordinates": "nope" }
        });
        assert!(feature_to_record(&feature).is_err());
    }

    #[test]
    fn plain_object_member_is_all_attributes() {
        let record = feature_to_record(&json!({ "name": "A", "kind": "x" })).unwrap();
        assert!(record.geometry.is_none());
        assert_eq!(record.attr("kind"), Some(&json!("x")));
    }
}
