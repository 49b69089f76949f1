//! Ordered shape classifiers.
//!
//! Each [`SourceShape`] variant recognizes one observed wrapping of feature
//! data. `classify` returns `None` when the value is not that shape, and
//! `Some(Err(..))` when the shape matched but its contents were malformed —
//! so the normalizer can stop at the first match instead of falling through
//! to weaker signals.

use serde_json::{Map, Value};
use strum_macros::Display;
use vector_extract_models::{Record, RecordCollection};

use crate::NormalizeError;
use crate::feature::{feature_to_record, flat_point_record};

/// One recognized wrapping of vector feature data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SourceShape {
    /// A JSON array of objects where every element carries both a `lat`
    /// and a `lon` field.
    #[strum(serialize = "flat lat/lon list")]
    FlatLatLon,
    /// A standard `GeoJSON` FeatureCollection (or any object with both a
    /// `type` tag and a `features` field).
    #[strum(serialize = "GeoJSON FeatureCollection")]
    FeatureCollection,
    /// An object wrapping its feature list under a `geoData` key.
    #[strum(serialize = "geoData list")]
    GeoDataList,
    /// An `ArcGIS` Esri payload with a nested `featureSet.features` list.
    #[strum(serialize = "ArcGIS featureSet")]
    FeatureSet,
    /// An object with a bare `features` field and no `type` tag.
    #[strum(serialize = "bare features list")]
    BareFeatures,
}

impl SourceShape {
    /// Detection order observed across real endpoints. The flat lat/lon
    /// check runs first: flat point lists are arrays, which none of the
    /// object classifiers can claim, and checking them first keeps a list
    /// of `{lat, lon, ...}` records from ever being misread as features.
    pub const DEFAULT_PRECEDENCE: [Self; 5] = [
        Self::FlatLatLon,
        Self::FeatureCollection,
        Self::GeoDataList,
        Self::FeatureSet,
        Self::BareFeatures,
    ];

    /// Attempts to normalize `value` as this shape.
    ///
    /// Returns `None` if the value is not this shape; `Some(Err(..))` if it
    /// is but its contents are malformed.
    #[must_use]
    pub fn classify(self, value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
        match self {
            Self::FlatLatLon => classify_flat_lat_lon(value),
            Self::FeatureCollection => classify_feature_collection(value),
            Self::GeoDataList => classify_geo_data(value),
            Self::FeatureSet => classify_feature_set(value),
            Self::BareFeatures => classify_bare_features(value),
        }
    }
}

/// Matches a JSON array of objects that all expose `lat` and `lon` keys
/// (null values count as exposed). Elements with a missing or non-numeric
/// coordinate are dropped, per the flat-list contract.
fn classify_flat_lat_lon(value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
    let list = value.as_array()?;
    let objects: Option<Vec<&Map<String, Value>>> = list.iter().map(Value::as_object).collect();
    let objects = objects?;
    if !objects
        .iter()
        .all(|obj| obj.contains_key("lat") && obj.contains_key("lon"))
    {
        return None;
    }

    let records: Vec<Record> = objects.iter().filter_map(|obj| flat_point_record(obj)).collect();
    let dropped = objects.len() - records.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} flat record(s) with missing or null lat/lon");
    }
    Some(Ok(RecordCollection::new(records)))
}

fn classify_feature_collection(value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
    let obj = value.as_object()?;
    let is_tagged_collection = obj.get("type").and_then(Value::as_str) == Some("FeatureCollection");
    let has_features_and_type = obj.contains_key("features") && obj.contains_key("type");
    if !is_tagged_collection && !has_features_and_type {
        return None;
    }

    match obj.get("features") {
        Some(Value::Array(features)) => Some(records_from_features(features)),
        // A tagged collection is allowed to omit `features` entirely, but a
        // present non-array member is malformed rather than empty.
        Some(other) => Some(Err(NormalizeError::MalformedShape {
            message: format!("FeatureCollection features member is not an array: {other}"),
        })),
        None => Some(records_from_features(&[])),
    }
}

fn classify_geo_data(value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
    let features = value.as_object()?.get("geoData")?.as_array()?;
    Some(records_from_features(features))
}

fn classify_feature_set(value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
    let features = value
        .as_object()?
        .get("featureSet")?
        .get("features")?
        .as_array()?;
    Some(records_from_features(features))
}

fn classify_bare_features(value: &Value) -> Option<Result<RecordCollection, NormalizeError>> {
    let obj = value.as_object()?;
    if obj.contains_key("type") {
        return None;
    }
    let features = obj.get("features")?.as_array()?;
    Some(records_from_features(features))
}

fn records_from_features(features: &[Value]) -> Result<RecordCollection, NormalizeError> {
    let records: Result<Vec<Record>, NormalizeError> =
        features.iter().map(feature_to_record).collect();
    Ok(RecordCollection::new(records?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_classifier_rejects_lists_with_missing_keys() {
        let value = json!([
            { "lat": 1.0, "lon": 2.0 },
            { "lat": 1.0, "name": "no lon" }
        ]);
        assert!(SourceShape::FlatLatLon.classify(&value).is_none());
    }

    #[test]
    fn flat_classifier_accepts_empty_list_as_no_data() {
        let value = json!([]);
        let collection = SourceShape::FlatLatLon.classify(&value).unwrap().unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn feature_collection_classifier_requires_type_tag() {
        let untagged = json!({ "features": [] });
        assert!(SourceShape::FeatureCollection.classify(&untagged).is_none());

        let tagged = json!({ "type": "FeatureCollection", "features": [] });
        assert!(SourceShape::FeatureCollection.classify(&tagged).is_some());
    }

    #[test]
    fn feature_collection_with_non_array_features_is_malformed() {
        let value = json!({ "type": "FeatureCollection", "features": "nope" });
        let err = SourceShape::FeatureCollection
            .classify(&value)
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedShape { .. }));
    }

    #[test]
    fn feature_collection_without_features_member_is_empty() {
        let value = json!({ "type": "FeatureCollection" });
        let collection = SourceShape::FeatureCollection
            .classify(&value)
            .unwrap()
            .unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn bare_features_classifier_rejects_tagged_objects() {
        let tagged = json!({ "type": "FeatureCollection", "features": [] });
        assert!(SourceShape::BareFeatures.classify(&tagged).is_none());
    }

    #[test]
    fn feature_set_classifier_needs_nested_features() {
        let value = json!({ "featureSet": { "count": 3 } });
        assert!(SourceShape::FeatureSet.classify(&value).is_none());

        let value = json!({ "featureSet": { "features": [] } });
        assert!(SourceShape::FeatureSet.classify(&value).is_some());
    }

    #[test]
    fn geo_data_must_be_a_list() {
        let value = json!({ "geoData": { "features": [] } });
        assert!(SourceShape::GeoDataList.classify(&value).is_none());
    }
}
