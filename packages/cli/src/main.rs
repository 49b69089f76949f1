#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the vector data extraction tool.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use strum::IntoEnumIterator;
use vector_extract_cli::{ExtractRequest, Outcome, SourceInput, run_extraction};
use vector_extract_models::{BoundingBox, OutputFormat};

#[derive(Parser)]
#[command(name = "vector_extract", about = "Vector geodata extraction tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a vector source, filter it, and write it re-encoded
    Extract {
        /// Source URL (JSON endpoint; bare ArcGIS `FeatureServer` URLs are
        /// rewritten to a full query)
        #[arg(long, conflicts_with = "input")]
        url: Option<String>,
        /// Local source file instead of a URL
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output layer / base filename
        #[arg(long)]
        layer: String,
        /// Bounding box as `min_lon,min_lat,max_lon,max_lat` (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,
        /// Attribute filter, e.g. `name = 'Ponte Vecchio' AND kind = 'storico'`
        #[arg(long = "where")]
        filter: Option<String>,
        /// Output format (see `formats`)
        #[arg(long, default_value = "geojson")]
        format: String,
        /// Directory the artifact is written into
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List the supported output formats
    Formats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Formats => {
            println!("{:<12} EXTENSION", "FORMAT");
            println!("{}", "-".repeat(30));
            for format in OutputFormat::iter() {
                println!("{:<12} .{}", format.to_string(), format.extension());
            }
        }
        Commands::Extract {
            url,
            input,
            layer,
            bbox,
            filter,
            format,
            output_dir,
        } => {
            let source = match (url, input) {
                (Some(url), None) => SourceInput::Url(url),
                (None, Some(path)) => SourceInput::File(path),
                _ => return Err("exactly one of --url or --input is required".into()),
            };
            let format = OutputFormat::from_str(&format)
                .map_err(|_| format!("unknown output format: {format}"))?;

            let request = ExtractRequest {
                source,
                layer_name: layer,
                bbox: bbox.as_deref().map(parse_bbox).transpose()?,
                attribute_filter: filter,
                format,
            };

            match run_extraction(&request).await? {
                Outcome::NoData => {
                    log::warn!("No data matched; nothing to download");
                }
                Outcome::Download(download) => {
                    std::fs::create_dir_all(&output_dir)?;
                    let path = output_dir.join(&download.filename);
                    std::fs::write(&path, &download.bytes)?;
                    log::info!(
                        "Saved {} ({} bytes, {})",
                        path.display(),
                        download.bytes.len(),
                        download.content_type
                    );
                }
            }
        }
    }

    Ok(())
}

/// Parses `min_lon,min_lat,max_lon,max_lat` into a validated box.
fn parse_bbox(text: &str) -> Result<BoundingBox, Box<dyn std::error::Error>> {
    let parts: Vec<f64> = text
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("bounding box must be four numbers, got {text:?}"))?;
    let [min_lon, min_lat, max_lon, max_lat] = parts.as_slice() else {
        return Err(format!("bounding box must have 4 values, got {}", parts.len()).into());
    };
    Ok(BoundingBox::new(*min_lon, *min_lat, *max_lon, *max_lat)?)
}
