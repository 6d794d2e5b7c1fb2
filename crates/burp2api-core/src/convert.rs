//! End-to-end conversion of a Burp export into its two outputs.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::burp::{BurpExport, NormalizedExport};
use crate::config::Config;
use crate::normalize::{normalize, NormalizedRecord};
use crate::openapi::{to_openapi, OpenApiDocument};

// External imports (alphabetized)
use tokio::fs;

/// In-memory result of running the pipeline over one export.
#[derive(Debug)]
pub struct Conversion {
    pub records: Vec<NormalizedRecord>,
    pub document: OpenApiDocument,
}

/// Files written by [`convert_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutput {
    pub openapi_path: PathBuf,
    pub normalized_path: PathBuf,
    pub record_count: usize,
}

/// Normalize an export and map it to OpenAPI.
pub fn convert(export: &BurpExport, config: &Config) -> crate::Result<Conversion> {
    let records = normalize(&export.items)?;
    let document = to_openapi(&records, config)?;
    Ok(Conversion { records, document })
}

/// Convert the export at `input`, writing `<stem>.json` and
/// `<stem>_modified.xml` under `config.output_dir`.
pub async fn convert_file<P: AsRef<Path>>(
    input: P,
    config: &Config,
) -> crate::Result<ConversionOutput> {
    let input = input.as_ref();
    let export = BurpExport::from_file(input).await?;
    let conversion = convert(&export, config)?;

    let output_dir = Path::new(&config.output_dir);
    if !output_dir.exists() {
        log::info!("Creating output directory: {}", output_dir.display());
        fs::create_dir_all(output_dir).await?;
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "burp".to_string());
    let openapi_path = output_dir.join(format!("{}.json", stem));
    let normalized_path = output_dir.join(format!("{}_modified.xml", stem));

    conversion.document.write_to_file(&openapi_path).await?;
    log::info!("OpenAPI document saved to {}", openapi_path.display());

    NormalizedExport::new(&conversion.records)
        .write_to_file(&normalized_path)
        .await?;
    log::info!("Normalized records saved to {}", normalized_path.display());

    Ok(ConversionOutput {
        openapi_path,
        normalized_path,
        record_count: conversion.records.len(),
    })
}
