#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the sku finder.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sku_finder_pipeline::config::PipelineArgs;
use sku_finder_pipeline::{commands, interactive};
use sku_finder_source_models::is_valid_identifier;

#[derive(Parser)]
#[command(name = "sku_finder", about = "Find product images by UPC/SKU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: PipelineArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Find images for a single SKU
    Find {
        /// UPC/SKU to look up (8-20 digits)
        sku: String,
    },
    /// Find images for every SKU in a CSV file (first column)
    Batch {
        /// Path to the CSV file
        file: PathBuf,
    },
    /// List all configured sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = sku_finder_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = cli.args.into_config()?;

    let Some(command) = cli.command else {
        return interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Find { sku } => {
            if !is_valid_identifier(&sku) {
                return Err(format!("Invalid SKU '{sku}': expected 8-20 digits").into());
            }
            commands::find(&config, &sku).await?;
        }
        Commands::Batch { file } => commands::batch(&config, &file, &multi).await?,
        Commands::Sources => commands::list_sources(),
    }

    Ok(())
}
