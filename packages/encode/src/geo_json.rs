//! `GeoJSON` FeatureCollection encoder.

use geojson::{Feature, FeatureCollection, JsonObject};
use vector_extract_models::RecordCollection;

use crate::EncodeError;

/// Serializes the collection as a standard FeatureCollection.
///
/// Null-valued attributes are omitted from feature properties, so the
/// output stays minimal and a re-normalization of it reproduces the same
/// records.
///
/// # Errors
///
/// Returns [`EncodeError::Json`] if serialization fails.
pub fn encode_geojson(collection: &RecordCollection) -> Result<Vec<u8>, EncodeError> {
    let features: Vec<Feature> = collection
        .records
        .iter()
        .map(|record| {
            let properties: JsonObject = record
                .attributes
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Feature {
                bbox: None,
                geometry: record
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    Ok(serde_json::to_vec(&feature_collection)?)
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, Point};
    use serde_json::json;
    use vector_extract_models::Record;

    use super::*;

    #[test]
    fn null_attributes_are_omitted() {
        let mut attrs = serde_json::Map::new();
        attrs.insert("name".to_string(), json!("A"));
        attrs.insert("empty".to_string(), serde_json::Value::Null);
        let collection = RecordCollection::new(vec![Record::new(
            attrs,
            Some(Geometry::Point(Point::new(9.19, 45.46))),
        )]);

        let bytes = encode_geojson(&collection).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(parsed["type"], json!("FeatureCollection"));
        let props = &parsed["features"][0]["properties"];
        assert_eq!(props["name"], json!("A"));
        assert!(props.get("empty").is_none());
    }

    #[test]
    fn geometry_less_records_serialize_with_null_geometry() {
        let collection =
            RecordCollection::new(vec![Record::new(serde_json::Map::new(), None)]);
        let bytes = encode_geojson(&collection).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed["features"][0]["geometry"].is_null());
    }
}
