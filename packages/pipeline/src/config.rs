//! Pipeline configuration.
//!
//! Every setting has a default. The binary overrides them from `SKU_FINDER_*`
//! environment variables and then command-line flags via [`PipelineArgs`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use sku_finder_pipeline_models::{
    AcceptancePolicy, ConfigError, DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH, DEFAULT_RELAXED_FLOOR,
};
use sku_finder_source::backoff::{
    BackoffExecutor, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
};
use strum_macros::{AsRefStr, Display};

/// Default number of accepted images per identifier.
pub const DEFAULT_MAX_IMAGES: usize = 5;

/// Default number of ranked candidates kept per identifier.
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Default number of top candidates retried with the relaxed floor.
pub const DEFAULT_RELAXED_TOP_N: usize = 3;

/// Default pause between identifiers in a batch.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Default output directory for images and exports.
pub const DEFAULT_OUTPUT_DIR: &str = "./images";

/// Where accepted images are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StorageBackend {
    /// Files under the output directory.
    #[default]
    Fs,
    /// Objects in a Cloudflare R2 bucket.
    R2,
}

/// Fully resolved pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum accepted images per identifier.
    pub max_images: usize,
    /// Maximum ranked candidates considered per identifier.
    pub max_results: usize,
    /// How many top candidates the relaxed pass re-attempts.
    pub relaxed_top_n: usize,
    /// Image size thresholds.
    pub policy: AcceptancePolicy,
    /// Delay before the first rate-limit retry.
    pub base_delay: Duration,
    /// Upper bound on a single rate-limit delay.
    pub max_delay: Duration,
    /// Rate-limit retries after the first call.
    pub max_retries: u32,
    /// Pause between identifiers in a batch.
    pub batch_pause: Duration,
    /// Directory for images (filesystem backend) and CSV exports.
    pub output_dir: PathBuf,
    /// Optional prefix prepended to every storage key.
    pub key_prefix: Option<String>,
    /// Storage backend for accepted images.
    pub storage: StorageBackend,
    /// Query sources concurrently for each identifier.
    pub concurrent_sources: bool,
    /// Restrict lookups to these source ids.
    pub sources: Option<Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            max_results: DEFAULT_MAX_RESULTS,
            relaxed_top_n: DEFAULT_RELAXED_TOP_N,
            policy: AcceptancePolicy::default(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_pause: DEFAULT_BATCH_PAUSE,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            key_prefix: None,
            storage: StorageBackend::Fs,
            concurrent_sources: false,
            sources: None,
        }
    }
}

impl PipelineConfig {
    /// Returns the backoff executor described by this config.
    #[must_use]
    pub const fn backoff(&self) -> BackoffExecutor {
        BackoffExecutor::new(self.base_delay, self.max_delay, self.max_retries)
    }
}

/// Command-line flags shared by every subcommand. Each flag can also be set
/// through the environment variable named in its help text.
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Directory for downloaded images and CSV exports
    #[arg(long, env = "SKU_FINDER_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR, global = true)]
    pub output_dir: PathBuf,

    /// Maximum number of images accepted per SKU
    #[arg(long, env = "SKU_FINDER_MAX_IMAGES", default_value_t = DEFAULT_MAX_IMAGES, global = true)]
    pub max_images: usize,

    /// Maximum number of ranked candidates considered per SKU
    #[arg(long, env = "SKU_FINDER_MAX_RESULTS", default_value_t = DEFAULT_MAX_RESULTS, global = true)]
    pub max_results: usize,

    /// Strict minimum image width in pixels
    #[arg(long, env = "SKU_FINDER_MIN_WIDTH", default_value_t = DEFAULT_MIN_WIDTH, global = true)]
    pub min_width: u32,

    /// Strict minimum image height in pixels
    #[arg(long, env = "SKU_FINDER_MIN_HEIGHT", default_value_t = DEFAULT_MIN_HEIGHT, global = true)]
    pub min_height: u32,

    /// Minimum size of the smaller dimension in the relaxed fallback pass
    #[arg(long, env = "SKU_FINDER_RELAXED_FLOOR", default_value_t = DEFAULT_RELAXED_FLOOR, global = true)]
    pub relaxed_floor: u32,

    /// Base rate-limit backoff delay in seconds
    #[arg(long, env = "SKU_FINDER_BASE_DELAY_SECS", default_value_t = DEFAULT_BASE_DELAY.as_secs_f64(), global = true)]
    pub base_delay_secs: f64,

    /// Maximum rate-limit backoff delay in seconds
    #[arg(long, env = "SKU_FINDER_MAX_DELAY_SECS", default_value_t = DEFAULT_MAX_DELAY.as_secs_f64(), global = true)]
    pub max_delay_secs: f64,

    /// Rate-limit retries after the first request
    #[arg(long, env = "SKU_FINDER_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES, global = true)]
    pub max_retries: u32,

    /// Pause between SKUs in batch mode, in seconds
    #[arg(long, env = "SKU_FINDER_BATCH_PAUSE_SECS", default_value_t = DEFAULT_BATCH_PAUSE.as_secs_f64(), global = true)]
    pub batch_pause_secs: f64,

    /// Prefix prepended to every storage key
    #[arg(long, env = "SKU_FINDER_KEY_PREFIX", global = true)]
    pub key_prefix: Option<String>,

    /// Where to store accepted images
    #[arg(long, env = "SKU_FINDER_STORAGE", value_enum, default_value_t = StorageBackend::Fs, global = true)]
    pub storage: StorageBackend,

    /// Query all sources for a SKU at the same time
    #[arg(long, env = "SKU_FINDER_CONCURRENT_SOURCES", global = true)]
    pub concurrent_sources: bool,

    /// Comma-separated list of source ids to query (see `sources`)
    #[arg(long, env = "SKU_FINDER_SOURCES", global = true)]
    pub sources: Option<String>,
}

impl PipelineArgs {
    /// Validates the flags and resolves them into a [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a count is zero, a duration is negative,
    /// or the relaxed floor exceeds the strict minimums.
    pub fn into_config(self) -> Result<PipelineConfig, ConfigError> {
        let policy = AcceptancePolicy::new(self.min_width, self.min_height, self.relaxed_floor)?;
        if self.max_images == 0 {
            return Err(invalid("max_images", "must be at least 1"));
        }
        if self.max_results == 0 {
            return Err(invalid("max_results", "must be at least 1"));
        }

        Ok(PipelineConfig {
            max_images: self.max_images,
            max_results: self.max_results,
            relaxed_top_n: DEFAULT_RELAXED_TOP_N,
            policy,
            base_delay: seconds("base_delay_secs", self.base_delay_secs)?,
            max_delay: seconds("max_delay_secs", self.max_delay_secs)?,
            max_retries: self.max_retries,
            batch_pause: seconds("batch_pause_secs", self.batch_pause_secs)?,
            output_dir: self.output_dir,
            key_prefix: self.key_prefix.filter(|p| !p.trim().is_empty()),
            storage: self.storage,
            concurrent_sources: self.concurrent_sources,
            sources: self.sources.map(|s| parse_source_list(&s)),
        })
    }
}

/// Splits a comma-separated id list, dropping blanks.
#[must_use]
pub fn parse_source_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| invalid(name, &e.to_string()))
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: PipelineArgs,
    }

    fn parse(flags: &[&str]) -> Result<PipelineConfig, ConfigError> {
        let mut argv = vec!["sku_finder"];
        argv.extend_from_slice(flags);
        TestCli::parse_from(argv).args.into_config()
    }

    #[test]
    fn defaults_match_library_defaults() {
        let config = parse(&[]).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.max_images, defaults.max_images);
        assert_eq!(config.policy, defaults.policy);
        assert_eq!(config.batch_pause, DEFAULT_BATCH_PAUSE);
        assert_eq!(config.backoff(), BackoffExecutor::default());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--max-images",
            "2",
            "--min-width",
            "500",
            "--relaxed-floor",
            "100",
            "--sources",
            "walmart, target,,",
            "--storage",
            "r2",
        ])
        .unwrap();
        assert_eq!(config.max_images, 2);
        assert_eq!(config.policy.min_width(), 500);
        assert_eq!(config.policy.relaxed_floor(), 100);
        assert_eq!(
            config.sources,
            Some(vec!["walmart".to_owned(), "target".to_owned()])
        );
        assert_eq!(config.storage, StorageBackend::R2);
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(matches!(
            parse(&["--min-height", "100"]),
            Err(ConfigError::RelaxedAboveStrict { .. })
        ));
        assert!(matches!(
            parse(&["--max-images", "0"]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse(&["--batch-pause-secs=-1"]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn storage_backend_names() {
        assert_eq!(StorageBackend::R2.to_string(), "r2");
        assert_eq!(StorageBackend::Fs.as_ref(), "fs");
    }
}
