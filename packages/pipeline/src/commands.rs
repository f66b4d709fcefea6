//! Top-level operations shared by the command line and interactive mode.

use std::path::Path;

use sku_finder_cli_utils::{IndicatifProgress, MultiProgress};
use sku_finder_pipeline_models::RunStatistics;
use sku_finder_source::registry;
use sku_finder_source_models::CandidateRecord;
use tokio_util::sync::CancellationToken;

use crate::PipelineError;
use crate::config::PipelineConfig;
use crate::csv_file::{export_results, read_identifiers};
use crate::orchestrator::Pipeline;

/// Looks up one identifier, then exports and summarizes the results.
///
/// # Errors
///
/// Returns [`PipelineError`] if the pipeline cannot be built, the lookup
/// fails, or the export cannot be written.
pub async fn find(config: &PipelineConfig, identifier: &str) -> Result<(), PipelineError> {
    let pipeline = Pipeline::from_config(config)?;
    let records = pipeline.run(identifier).await?;
    println!("Found {} images for SKU: {}", records.len(), identifier.trim());
    report(config, &records)
}

/// Runs every identifier listed in `file` (first CSV column) through the
/// pipeline with a progress bar, then exports and summarizes the results.
///
/// Ctrl-C stops the batch before the next identifier; results gathered so
/// far are still exported.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read, the pipeline
/// cannot be built, or the export cannot be written.
pub async fn batch(
    config: &PipelineConfig,
    file: &Path,
    multi: &MultiProgress,
) -> Result<(), PipelineError> {
    let identifiers = read_identifiers(file)?;
    if identifiers.is_empty() {
        println!("No valid SKUs found in {}", file.display());
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config)?;
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping after the current SKU");
                cancel.cancel();
            }
        }
    });

    let progress = IndicatifProgress::sku_batch(multi, &file.display().to_string());
    let result = pipeline
        .run_batch(&identifiers, &cancel, progress.as_ref())
        .await;
    watcher.abort();

    println!("Processed {} SKUs", result.len());
    let records: Vec<CandidateRecord> = result.records().cloned().collect();
    report(config, &records)
}

/// Prints a table of every configured source.
pub fn list_sources() {
    println!(
        "{:<20} {:<20} {:<14} {:>8} {:>10}  {:<8} CREDENTIAL",
        "ID", "NAME", "KIND", "PRIORITY", "CONFIDENCE", "ENABLED"
    );
    println!("{}", "-".repeat(100));
    for source in registry::all_sources() {
        println!(
            "{:<20} {:<20} {:<14} {:>8} {:>10.2}  {:<8} {}",
            source.id(),
            source.name(),
            source.kind.as_ref(),
            source.priority,
            source.confidence,
            if source.enabled { "yes" } else { "no" },
            source.adapter.credential_env().unwrap_or("-")
        );
    }
}

/// Exports `records` to CSV and prints run statistics as JSON. Does nothing
/// when there are no records.
fn report(config: &PipelineConfig, records: &[CandidateRecord]) -> Result<(), PipelineError> {
    if records.is_empty() {
        return Ok(());
    }

    let path = export_results(&config.output_dir, records)?;
    let stats = RunStatistics::from_records(records);
    println!("\nResults exported to: {}", path.display());
    println!("Statistics: {}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
