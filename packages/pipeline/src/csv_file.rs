//! CSV input (identifier lists) and output (result exports).

use std::path::{Path, PathBuf};

use serde::Serialize;
use sku_finder_source_models::{CandidateRecord, is_valid_identifier};

use crate::PipelineError;

/// One exported row. Column order is fixed.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    sku: &'a str,
    source: &'a str,
    image_url: &'a str,
    title: &'a str,
    price: &'a str,
    description: &'a str,
    local_path: &'a str,
    confidence: f64,
}

impl<'a> From<&'a CandidateRecord> for ExportRow<'a> {
    fn from(record: &'a CandidateRecord) -> Self {
        Self {
            sku: &record.identifier,
            source: &record.source,
            image_url: &record.image_url,
            title: &record.title,
            price: record.price.as_deref().unwrap_or_default(),
            description: record.description.as_deref().unwrap_or_default(),
            local_path: record.local_path.as_deref().unwrap_or_default(),
            confidence: record.confidence,
        }
    }
}

/// Reads identifiers from the first column of a header-less CSV file.
///
/// Blank cells are skipped. Cells that are not 8-20 digits are logged and
/// skipped.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the file cannot be read.
pub fn read_identifiers(path: &Path) -> Result<Vec<String>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut identifiers = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(cell) = row.get(0).filter(|c| !c.is_empty()) else {
            continue;
        };
        if is_valid_identifier(cell) {
            identifiers.push(cell.to_owned());
        } else {
            log::warn!("Skipping invalid identifier '{cell}' in {}", path.display());
        }
    }
    Ok(identifiers)
}

/// Writes `records` to `path` with the fixed export columns.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the file cannot be written.
pub fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a CandidateRecord>,
) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `records` to `sku_results_{unix_seconds}.csv` in `output_dir`
/// and returns the file path.
///
/// # Errors
///
/// Returns [`PipelineError`] if the directory cannot be created or the file
/// cannot be written.
pub fn export_results<'a>(
    output_dir: &Path,
    records: impl IntoIterator<Item = &'a CandidateRecord>,
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!(
        "sku_results_{}.csv",
        chrono::Utc::now().timestamp()
    ));
    write_records(&path, records)?;
    log::info!("Exported results to {}", path.display());
    Ok(path)
}
