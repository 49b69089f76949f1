//! Bounding-box filtering via an R-tree over record envelopes.
//!
//! A record is kept iff its geometry *envelope* intersects the box, not
//! merely its reference point — some records carry extended geometries.
//! Records without geometry cannot intersect anything and are dropped.

use geo::BoundingRect;
use rstar::{AABB, RTree, RTreeObject};
use vector_extract_models::{BoundingBox, RecordCollection};

/// A record's envelope stored in the R-tree with its original position.
struct RecordEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RecordEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Keeps the records whose geometry envelope intersects `bbox`,
/// preserving input order.
#[must_use]
pub fn filter_bounding_box(collection: RecordCollection, bbox: &BoundingBox) -> RecordCollection {
    let entries: Vec<RecordEnvelope> = collection
        .records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let rect = record.geometry.as_ref()?.bounding_rect()?;
            Some(RecordEnvelope {
                index,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();

    let tree = RTree::bulk_load(entries);
    let query = AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);

    let mut keep = vec![false; collection.records.len()];
    for entry in tree.locate_in_envelope_intersecting(&query) {
        keep[entry.index] = true;
    }

    let before = collection.len();
    let records: Vec<_> = collection
        .records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, kept)| kept.then_some(record))
        .collect();
    log::info!("Bounding box kept {} of {before} record(s)", records.len());
    RecordCollection::new(records)
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, LineString, Point};
    use serde_json::json;
    use vector_extract_models::Record;

    use super::*;

    fn point_record(name: &str, lon: f64, lat: f64) -> Record {
        let mut attrs = serde_json::Map::new();
        attrs.insert("name".to_string(), json!(name));
        Record::new(attrs, Some(Geometry::Point(Point::new(lon, lat))))
    }

    #[test]
    fn keeps_inside_point_and_drops_outside_point() {
        let collection = RecordCollection::new(vec![
            point_record("milan", 9.19, 45.46),
            point_record("elsewhere", 20.0, 10.0),
        ]);
        let bbox = BoundingBox::new(9.0, 45.0, 10.0, 46.0).unwrap();

        let result = filter_bounding_box(collection, &bbox);
        assert_eq!(result.len(), 1);
        assert_eq!(result.records[0].attr("name"), Some(&json!("milan")));
    }

    #[test]
    fn extended_geometry_is_kept_when_only_its_envelope_overlaps() {
        // A line that starts outside the box but crosses its envelope.
        let line = LineString::from(vec![(8.0, 44.0), (11.0, 47.0)]);
        let collection = RecordCollection::new(vec![Record::new(
            serde_json::Map::new(),
            Some(Geometry::LineString(line)),
        )]);
        let bbox = BoundingBox::new(9.0, 45.0, 10.0, 46.0).unwrap();

        assert_eq!(filter_bounding_box(collection, &bbox).len(), 1);
    }

    #[test]
    fn geometry_less_records_are_dropped() {
        let collection =
            RecordCollection::new(vec![Record::new(serde_json::Map::new(), None)]);
        let bbox = BoundingBox::new(-180.0, -90.0, 180.0, 90.0).unwrap();

        assert!(filter_bounding_box(collection, &bbox).is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let collection = RecordCollection::new(vec![
            point_record("a", 9.1, 45.1),
            point_record("b", 9.2, 45.2),
            point_record("c", 9.3, 45.3),
        ]);
        let bbox = BoundingBox::new(9.0, 45.0, 10.0, 46.0).unwrap();

        let names: Vec<_> = filter_bounding_box(collection, &bbox)
            .records
            .iter()
            .map(|r| r.attr("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
    }
}
