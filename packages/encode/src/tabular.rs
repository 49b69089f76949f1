//! Tabular encoders (CSV and Excel).
//!
//! Geometry is dropped as a field and re-added as a trailing WKT text
//! column, so spreadsheet users still get a standard representation of
//! each shape.

use geozero::ToWkt;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use vector_extract_models::{Record, RecordCollection};

use crate::EncodeError;

/// Name of the appended geometry column.
pub const GEOMETRY_COLUMN: &str = "wkt_geometry";

/// Serializes the collection as UTF-8 CSV with a trailing WKT column.
///
/// # Errors
///
/// Returns [`EncodeError::Csv`] on write failure and
/// [`EncodeError::Geometry`] if a geometry cannot be rendered as WKT.
pub fn encode_csv(collection: &RecordCollection) -> Result<Vec<u8>, EncodeError> {
    let columns = collection.field_names();
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push(GEOMETRY_COLUMN);
    writer.write_record(&header)?;

    for record in &collection.records {
        let mut row: Vec<String> = columns
            .iter()
            .map(|column| cell_text(record.attr(column)))
            .collect();
        row.push(wkt_text(record)?);
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| EncodeError::Io(e.into_error()))
}

/// Serializes the collection as an Excel workbook with one worksheet,
/// mirroring the CSV layout. Numbers are written as numbers so the
/// spreadsheet can aggregate them.
///
/// # Errors
///
/// Returns [`EncodeError::Xlsx`] on workbook failure and
/// [`EncodeError::Geometry`] if a geometry cannot be rendered as WKT.
pub fn encode_xlsx(collection: &RecordCollection) -> Result<Vec<u8>, EncodeError> {
    let columns = collection.field_names();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, to_col(col), name)?;
    }
    worksheet.write_string(0, to_col(columns.len()), GEOMETRY_COLUMN)?;

    for (i, record) in collection.records.iter().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| EncodeError::Geometry {
            message: "worksheet row limit exceeded".to_string(),
        })?;
        for (col, column) in columns.iter().enumerate() {
            match record.attr(column) {
                Some(Value::Number(n)) => {
                    worksheet.write_number(row, to_col(col), n.as_f64().unwrap_or(f64::NAN))?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(row, to_col(col), *b)?;
                }
                other => {
                    let text = cell_text(other);
                    if !text.is_empty() {
                        worksheet.write_string(row, to_col(col), &text)?;
                    }
                }
            }
        }
        worksheet.write_string(row, to_col(columns.len()), &wkt_text(record)?)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Worksheet columns are u16; a schema that wide is not reachable in
/// practice, but saturate instead of panicking.
fn to_col(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // Nested arrays/objects are kept as JSON text.
        Some(nested) => nested.to_string(),
    }
}

fn wkt_text(record: &Record) -> Result<String, EncodeError> {
    record.geometry.as_ref().map_or_else(
        || Ok(String::new()),
        |geometry| {
            geometry.to_wkt().map_err(|e| EncodeError::Geometry {
                message: format!("WKT conversion failed: {e}"),
            })
        },
    )
}
