#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! JSON shape detection and normalization.
//!
//! Real-world endpoints wrap feature lists under inconsistent keys: a
//! standard `GeoJSON` FeatureCollection, an `ArcGIS` `featureSet`
//! container, a nested `geoData` list, a bare `features` field, or a flat
//! list of records carrying separate `lat`/`lon` columns. The normalizer
//! tries an ordered list of shape classifiers and returns the first match
//! as a [`RecordCollection`], so callers never have to declare the source
//! format up front.

pub mod feature;
pub mod shape;

pub use shape::SourceShape;
use vector_extract_models::RecordCollection;

/// Errors that can occur while normalizing source bytes.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The input bytes are not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The JSON is valid but matches none of the recognized shapes.
    #[error("unrecognized JSON shape: expected a FeatureCollection, featureSet, geoData list, features field, or a flat lat/lon record list")]
    UnrecognizedShape,

    /// A matched shape is structurally broken, such as a FeatureCollection
    /// whose `features` member is not an array.
    #[error("malformed shape: {message}")]
    MalformedShape {
        /// What is structurally wrong.
        message: String,
    },

    /// A matched shape carried a geometry that could not be interpreted.
    #[error("invalid geometry: {message}")]
    InvalidGeometry {
        /// What could not be interpreted.
        message: String,
    },
}

/// Parses `bytes` as JSON and normalizes it using the default shape
/// precedence.
///
/// An empty resulting collection is a successful outcome ("no data"), not
/// an error.
///
/// # Errors
///
/// Returns [`NormalizeError::Parse`] for invalid JSON,
/// [`NormalizeError::UnrecognizedShape`] when no classifier matches, and
/// [`NormalizeError::InvalidGeometry`] when a matched shape holds a
/// malformed geometry.
pub fn normalize(bytes: &[u8]) -> Result<RecordCollection, NormalizeError> {
    normalize_with_precedence(bytes, &SourceShape::DEFAULT_PRECEDENCE)
}

/// Like [`normalize`], but with a caller-supplied classifier order.
///
/// The flat lat/lon classifier must stay ahead of the object-shape
/// classifiers in any sensible order, since flat point lists are not valid
/// `GeoJSON` objects; the object shapes are mutually exclusive in practice
/// and may be reordered freely.
///
/// # Errors
///
/// Same as [`normalize`].
pub fn normalize_with_precedence(
    bytes: &[u8],
    precedence: &[SourceShape],
) -> Result<RecordCollection, NormalizeError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    for shape in precedence {
        if let Some(outcome) = shape.classify(&value) {
            let collection = outcome?;
            log::info!(
                "Detected {shape} source: {} record(s) normalized",
                collection.len()
            );
            return Ok(collection);
        }
    }

    Err(NormalizeError::UnrecognizedShape)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bytes(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    /// The same two semantic records, wrapped four different ways.
    fn equivalent_payloads() -> Vec<serde_json::Value> {
        let features = json!([
            {
                "type": "Feature",
                "properties": { "name": "A" },
                "geometry": { "type": "Point", "coordinates": [9.19, 45.46] }
            },
            {
                "type": "Feature",
                "properties": { "name": "B" },
                "geometry": { "type": "Point", "coordinates": [9.2, 45.5] }
            }
        ]);
        vec![
            json!({ "type": "FeatureCollection", "features": features }),
            json!({ "features": features }),
            json!({ "featureSet": { "features": features } }),
            json!({ "geoData": features }),
        ]
    }

    #[test]
    fn all_wrappings_normalize_identically() {
        let collections: Vec<RecordCollection> = equivalent_payloads()
            .iter()
            .map(|payload| normalize(&bytes(payload)).unwrap())
            .collect();

        for collection in &collections {
            assert_eq!(collection.len(), 2);
            assert_eq!(
                collection.records[0].attr("name"),
                Some(&json!("A"))
            );
        }
        assert!(collections.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn flat_list_drops_null_coordinates_and_strips_lat_lon() {
        let payload = json!([
            { "lat": 45.46, "lon": 9.19, "name": "A" },
            { "lat": null, "lon": 9.2, "name": "B" }
        ]);
        let collection = normalize(&bytes(&payload)).unwrap();

        assert_eq!(collection.len(), 1);
        let record = &collection.records[0];
        assert_eq!(record.attr("name"), Some(&json!("A")));
        assert!(record.attr("lat").is_none());
        assert!(record.attr("lon").is_none());
        let Some(geo::Geometry::Point(point)) = record.geometry.clone() else {
            panic!("expected a point geometry");
        };
        assert!((point.x() - 9.19).abs() < f64::EPSILON);
        assert!((point.y() - 45.46).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = normalize(b"not json {").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse(_)));
    }

    #[test]
    fn unrelated_object_is_an_unrecognized_shape() {
        let err = normalize(&bytes(&json!({ "rows": [1, 2, 3] }))).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedShape));
    }

    #[test]
    fn empty_feature_collection_is_no_data_not_an_error() {
        let payload = json!({ "type": "FeatureCollection", "features": [] });
        let collection = normalize(&bytes(&payload)).unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn precedence_is_configurable() {
        // A payload that only the bare-features classifier accepts.
        let payload = json!({ "features": [{ "properties": { "name": "A" }, "geometry": null }] });
        let collection =
            normalize_with_precedence(&bytes(&payload), &[SourceShape::BareFeatures]).unwrap();
        assert_eq!(collection.len(), 1);

        let err = normalize_with_precedence(&bytes(&payload), &[SourceShape::FlatLatLon])
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedShape));
    }
}
