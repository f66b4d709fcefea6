//! Interactive mode for the sku finder.
//!
//! Provides a menu-driven interface using `dialoguer` for running lookups
//! without memorizing CLI flags.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use sku_finder_cli_utils::MultiProgress;
use sku_finder_source_models::is_valid_identifier;

use crate::commands;
use crate::config::PipelineConfig;

/// Top-level actions available in the interactive menu.
enum Action {
    FindOne,
    Batch,
    ListSources,
}

impl Action {
    const ALL: &[Self] = &[Self::FindOne, Self::Batch, Self::ListSources];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::FindOne => "Find images for a SKU",
            Self::Batch => "Process a CSV file of SKUs",
            Self::ListSources => "List sources",
        }
    }
}

/// Prompts for an action and runs it with `config`.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected operation fails.
pub async fn run(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("SKU Image Finder");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::FindOne => {
            let sku: String = Input::new()
                .with_prompt("SKU / UPC")
                .validate_with(|input: &String| {
                    if is_valid_identifier(input) {
                        Ok(())
                    } else {
                        Err("expected 8-20 digits")
                    }
                })
                .interact_text()?;
            commands::find(config, &sku).await?;
        }
        Action::Batch => {
            let file: String = Input::new()
                .with_prompt("CSV file (SKUs in the first column)")
                .validate_with(|input: &String| {
                    if PathBuf::from(input.trim()).is_file() {
                        Ok(())
                    } else {
                        Err("file not found")
                    }
                })
                .interact_text()?;
            commands::batch(config, &PathBuf::from(file.trim()), multi).await?;
        }
        Action::ListSources => commands::list_sources(),
    }

    Ok(())
}
