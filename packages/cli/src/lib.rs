#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The extraction pipeline: acquisition, normalization, filtering,
//! encoding, delivery.
//!
//! One run per user action, executed as a blocking sequence with a single
//! awaited fetch. Every stage failure is caught here and surfaced once as
//! an [`ExtractError`]; an empty collection (before or after filtering) is
//! the distinct [`Outcome::NoData`], not an error. Nothing is retried and
//! no partial output is ever produced.

use std::path::PathBuf;

use vector_extract_encode::{EncodeError, encode};
use vector_extract_filter::{FilterError, filter_attributes, filter_bounding_box};
use vector_extract_models::{BoundingBox, Download, OutputFormat, RecordCollection};
use vector_extract_normalize::{NormalizeError, normalize};
use vector_extract_source::{SourceError, fetch_url, read_file};

/// Where the raw bytes come from.
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// Remote endpoint, fetched over HTTP(S).
    Url(String),
    /// Local file supplied by the user.
    File(PathBuf),
}

/// One extraction run, as configured by the user.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Where to read raw bytes from.
    pub source: SourceInput,
    /// Output layer / base filename.
    pub layer_name: String,
    /// Optional WGS84 window; records whose envelope misses it are
    /// dropped.
    pub bbox: Option<BoundingBox>,
    /// Optional boolean attribute expression.
    pub attribute_filter: Option<String>,
    /// Target encoding.
    pub format: OutputFormat,
}

/// Result of a successful run.
#[derive(Debug)]
pub enum Outcome {
    /// The encoded artifact, ready for delivery.
    Download(Download),
    /// Valid source, but zero records after normalization or filtering.
    NoData,
}

/// Pipeline-level error taxonomy. Each stage's failure class maps to one
/// variant; all are reported to the user without crashing the process.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Fetch or file-read failure (transport, HTTP status, I/O).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Invalid JSON or unrecognized payload shape.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Malformed or unevaluable attribute expression.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The target format rejected the record set.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Runs one extraction end to end.
///
/// # Errors
///
/// Returns [`ExtractError`] when any stage fails; see the variant docs
/// for the stage-to-error mapping.
pub async fn run_extraction(request: &ExtractRequest) -> Result<Outcome, ExtractError> {
    let bytes = match &request.source {
        SourceInput::Url(url) => {
            let client = reqwest::Client::new();
            fetch_url(&client, url).await?
        }
        SourceInput::File(path) => read_file(path)?,
    };

    let collection = normalize(&bytes)?;
    if collection.is_empty() {
        log::warn!("Source contained no records");
        return Ok(Outcome::NoData);
    }

    let collection = apply_filters(collection, request)?;
    if collection.is_empty() {
        log::warn!("No records matched the filters");
        return Ok(Outcome::NoData);
    }

    let download = encode(&collection, request.format, &request.layer_name)?;
    Ok(Outcome::Download(download))
}

/// Bounding box first, then the attribute expression; both optional.
fn apply_filters(
    collection: RecordCollection,
    request: &ExtractRequest,
) -> Result<RecordCollection, FilterError> {
    let collection = match &request.bbox {
        Some(bbox) => filter_bounding_box(collection, bbox),
        None => collection,
    };
    match request.attribute_filter.as_deref() {
        Some(expression) if !expression.trim().is_empty() => {
            filter_attributes(collection, expression)
        }
        _ => Ok(collection),
    }
}
