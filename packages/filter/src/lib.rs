#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record filtering: a rectangular WGS84 window over geometry envelopes,
//! and a user-supplied boolean expression over attribute fields.
//!
//! Both filters are optional and independent; the pipeline applies the
//! bounding box first, then the attribute expression. A malformed
//! expression (or a reference to a field no record carries) aborts the
//! whole filtering stage — it never silently yields an empty result.

pub mod bbox;
pub mod expr;

pub use bbox::filter_bounding_box;
pub use expr::FilterExpr;
use vector_extract_models::RecordCollection;

/// Errors raised by the attribute-filter stage.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The expression string could not be parsed.
    #[error("filter syntax error: {message}")]
    Syntax {
        /// What the parser rejected.
        message: String,
    },

    /// The expression references a field absent from the collection's
    /// union schema.
    #[error("filter references unknown field \"{field}\"")]
    UnknownField {
        /// The unresolved field name.
        field: String,
    },
}

/// Parses `expression`, validates its field references against the
/// collection's union schema, and keeps the records it accepts.
///
/// # Errors
///
/// Returns [`FilterError::Syntax`] for a malformed expression and
/// [`FilterError::UnknownField`] when the expression names a field no
/// record carries.
pub fn filter_attributes(
    collection: RecordCollection,
    expression: &str,
) -> Result<RecordCollection, FilterError> {
    let parsed = FilterExpr::parse(expression)?;
    parsed.validate(&collection.field_names())?;

    let before = collection.len();
    let records = collection
        .records
        .into_iter()
        .filter(|record| parsed.eval(record))
        .collect::<Vec<_>>();
    log::info!(
        "Attribute filter kept {} of {before} record(s)",
        records.len()
    );
    Ok(RecordCollection::new(records))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vector_extract_models::Record;

    use super::*;

    fn collection() -> RecordCollection {
        let mut a = serde_json::Map::new();
        a.insert("name".to_string(), json!("Ponte Vecchio"));
        a.insert("kind".to_string(), json!("storico"));
        a.insert("height".to_string(), json!(12.5));
        let mut b = serde_json::Map::new();
        b.insert("name".to_string(), json!("Viadotto Nuovo"));
        b.insert("kind".to_string(), json!("moderno"));
        b.insert("height".to_string(), json!(40));
        RecordCollection::new(vec![Record::new(a, None), Record::new(b, None)])
    }

    #[test]
    fn equality_and_conjunction() {
        let result = filter_attributes(
            collection(),
            "name = 'Ponte Vecchio' AND kind = 'storico'",
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.records[0].attr("kind"), Some(&json!("storico")));
    }

    #[test]
    fn numeric_comparison() {
        let result = filter_attributes(collection(), "height > 20").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.records[0].attr("name"),
            Some(&json!("Viadotto Nuovo"))
        );
    }

    #[test]
    fn membership() {
        let result =
            filter_attributes(collection(), "kind IN ('storico', 'antico')").unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn unknown_field_is_an_error_not_an_empty_result() {
        let err = filter_attributes(collection(), "tipo = 'storico'").unwrap_err();
        assert!(matches!(err, FilterError::UnknownField { field } if field == "tipo"));
    }

    #[test]
    fn malformed_expression_is_a_syntax_error() {
        let err = filter_attributes(collection(), "name = ").unwrap_err();
        assert!(matches!(err, FilterError::Syntax { .. }));
    }
}
