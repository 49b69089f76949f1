#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw byte acquisition for the extraction pipeline.
//!
//! A source is either a remote URL (fetched over HTTPS) or a local file
//! supplied by the user. `ArcGIS` `FeatureServer` endpoints given without a
//! query string are rewritten to the standard "return everything as
//! `GeoJSON`" query before fetching, so users can paste the bare service
//! URL.

use std::borrow::Cow;
use std::path::Path;

/// Errors that can occur while acquiring source bytes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or transport failure during fetch.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Status {
        /// Response status code.
        status: u16,
        /// The URL that was fetched.
        url: String,
    },

    /// Local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Query suffix that asks an `ArcGIS` layer for all records as `GeoJSON`.
const ARCGIS_ALL_RECORDS_QUERY: &str = "where=1%3D1&outFields=*&f=geojson";

/// Rewrites a bare `ArcGIS` `FeatureServer` URL into a full query URL.
///
/// Applies only when the URL contains a `FeatureServer` path segment and
/// carries no query string of its own; anything else passes through
/// unchanged. A trailing `/query` segment is reused rather than doubled.
#[must_use]
pub fn rewrite_arcgis_url(url: &str) -> Cow<'_, str> {
    if !url.contains("/FeatureServer") || url.contains('?') {
        return Cow::Borrowed(url);
    }
    let base = url.trim_end_matches('/');
    let rewritten = if base.ends_with("/query") {
        format!("{base}?{ARCGIS_ALL_RECORDS_QUERY}")
    } else {
        format!("{base}/query?{ARCGIS_ALL_RECORDS_QUERY}")
    };
    Cow::Owned(rewritten)
}

/// Fetches raw bytes from `url`, applying the `ArcGIS` rewrite first.
///
/// # Errors
///
/// Returns [`SourceError::Http`] on transport failure and
/// [`SourceError::Status`] on a non-2xx response.
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, SourceError> {
    let effective = rewrite_arcgis_url(url);
    if effective != url {
        log::info!("ArcGIS endpoint detected, querying {effective}");
    }

    let response = client.get(effective.as_ref()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: effective.into_owned(),
        });
    }

    let bytes = response.bytes().await?;
    log::info!("Fetched {} bytes from {url}", bytes.len());
    Ok(bytes.to_vec())
}

/// Reads raw bytes from a local file (the "uploaded file" path).
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be read.
pub fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    let bytes = std::fs::read(path)?;
    log::info!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_bare_feature_server_layer_url() {
        let url = "https://maps.example.com/arcgis/rest/services/roads/FeatureServer/0";
        assert_eq!(
            rewrite_arcgis_url(url),
            "https://maps.example.com/arcgis/rest/services/roads/FeatureServer/0/query?where=1%3D1&outFields=*&f=geojson"
        );
    }

    #[test]
    fn reuses_existing_query_segment() {
        let url = "https://maps.example.com/arcgis/rest/services/roads/FeatureServer/0/query";
        assert_eq!(
            rewrite_arcgis_url(url),
            "https://maps.example.com/arcgis/rest/services/roads/FeatureServer/0/query?where=1%3D1&outFields=*&f=geojson"
        );
    }

    #[test]
    fn leaves_urls_with_query_strings_alone() {
        let url = "https://maps.example.com/FeatureServer/0/query?where=A%3D1&f=json";
        assert_eq!(rewrite_arcgis_url(url), url);
    }

    #[test]
    fn leaves_non_arcgis_urls_alone() {
        let url = "https://data.example.com/export.geojson";
        assert_eq!(rewrite_arcgis_url(url), url);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_file(Path::new("/nonexistent/source.json")).unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}
