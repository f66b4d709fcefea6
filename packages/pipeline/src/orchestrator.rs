//! Per-identifier and batch orchestration.
//!
//! ```text
//! aggregate -> rank -> strict pass -> (nothing accepted?) relaxed pass -> done
//! ```
//!
//! The strict pass walks the ranked candidates in order and stops once
//! `max_images` are accepted. If it accepts nothing, the relaxed pass
//! retries only the top `relaxed_top_n` candidates against the relaxed
//! floor, reusing bytes already downloaded. Candidates whose body was
//! already found unusable are not fetched again. Sources are never queried
//! twice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use sku_finder_pipeline_models::{AcceptanceMode, AcceptancePolicy, BatchResult};
use sku_finder_source::aggregator::Aggregator;
use sku_finder_source::priority::SourcePriority;
use sku_finder_source::progress::ProgressCallback;
use sku_finder_source::registry;
use sku_finder_source_models::{CandidateRecord, is_valid_identifier};
use sku_finder_storage::{ArtifactStore, StorageError};
use sku_finder_storage::fs::FsStore;
use tokio_util::sync::CancellationToken;

use crate::PipelineError;
use crate::config::{PipelineConfig, StorageBackend};
use crate::download::{
    DOWNLOAD_TIMEOUT, Downloader, FetchedImage, HttpImageFetcher, ImageFetcher, Rejection,
};
use crate::key::storage_key;

/// Limits applied to each identifier's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Maximum accepted images per identifier.
    pub max_images: usize,
    /// Maximum ranked candidates considered.
    pub max_results: usize,
    /// Number of top candidates retried in the relaxed pass.
    pub relaxed_top_n: usize,
    /// Pause between identifiers in a batch.
    pub batch_pause: Duration,
    /// Prefix for storage keys.
    pub key_prefix: Option<String>,
}

impl From<&PipelineConfig> for RunSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_images: config.max_images,
            max_results: config.max_results,
            relaxed_top_n: config.relaxed_top_n,
            batch_pause: config.batch_pause,
            key_prefix: config.key_prefix.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Finds, validates, and stores images for product identifiers.
pub struct Pipeline {
    aggregator: Aggregator,
    downloader: Downloader,
    store: Arc<dyn ArtifactStore>,
    policy: AcceptancePolicy,
    settings: RunSettings,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.aggregator.adapters().len())
            .field("store", &self.store.describe())
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assembles a pipeline from its parts.
    #[must_use]
    pub fn new(
        aggregator: Aggregator,
        fetcher: Arc<dyn ImageFetcher>,
        store: Arc<dyn ArtifactStore>,
        policy: AcceptancePolicy,
        settings: RunSettings,
    ) -> Self {
        Self {
            aggregator,
            downloader: Downloader::new(fetcher),
            store,
            policy,
            settings,
        }
    }

    /// Builds the production pipeline: registry sources, HTTP downloads,
    /// and the configured storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the HTTP client or storage backend
    /// cannot be created.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let definitions = registry::enabled_sources(config.sources.as_deref());
        let priorities = SourcePriority::from_definitions(&registry::all_sources());
        let adapters = registry::build_adapters(definitions, config.backoff(), config.max_images);
        log::info!(
            "Using {} source(s): {}",
            adapters.len(),
            adapters
                .iter()
                .map(|a| a.id())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let aggregator =
            Aggregator::new(adapters, priorities).with_concurrency(config.concurrent_sources);
        let fetcher = HttpImageFetcher::new(DOWNLOAD_TIMEOUT)?;
        let store = open_store(config)?;
        log::info!("Storing images in {}", store.describe());

        Ok(Self::new(
            aggregator,
            Arc::new(fetcher),
            store,
            config.policy,
            RunSettings::from(config),
        ))
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Finds and stores images for one identifier, returning the accepted
    /// records in acceptance order. An empty result is a normal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidIdentifier`] for malformed input and
    /// [`PipelineError::PartialStore`] if writing an accepted image fails.
    /// The error carries the records already stored for this identifier.
    pub async fn run(&self, identifier: &str) -> Result<Vec<CandidateRecord>, PipelineError> {
        let identifier = identifier.trim();
        if !is_valid_identifier(identifier) {
            return Err(PipelineError::InvalidIdentifier {
                identifier: identifier.to_owned(),
            });
        }

        let candidates = self
            .aggregator
            .aggregate(identifier, self.settings.max_results)
            .await;
        if candidates.is_empty() {
            log::info!("{identifier}: no candidates found");
            return Ok(Vec::new());
        }

        let max_images = self.settings.max_images;
        let mut accepted = Vec::new();
        let mut accepted_urls = BTreeSet::new();
        let mut retained: BTreeMap<usize, FetchedImage> = BTreeMap::new();
        let mut unusable = BTreeSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            if accepted.len() >= max_images {
                break;
            }
            if accepted_urls.contains(candidate.image_url.as_str()) {
                continue;
            }
            let image = match self.fetch(candidate).await {
                Ok(image) => image,
                Err(rejection) => {
                    if rejection.is_permanent() {
                        unusable.insert(index);
                    }
                    continue;
                }
            };

            if self
                .policy
                .accepts(image.width, image.height, AcceptanceMode::Strict)
            {
                match self.persist(candidate, &image).await {
                    Ok(record) => accepted.push(record),
                    Err(source) => return Err(partial_store(identifier, accepted, source)),
                }
                accepted_urls.insert(candidate.image_url.as_str());
            } else {
                log::debug!(
                    "{identifier}: {} too small ({}x{}, need {}x{})",
                    candidate.image_url,
                    image.width,
                    image.height,
                    self.policy.min_width(),
                    self.policy.min_height()
                );
                if index < self.settings.relaxed_top_n {
                    retained.insert(index, image);
                }
            }
        }

        if accepted.is_empty() {
            log::info!(
                "{identifier}: nothing passed the strict check, retrying top {} with a {}px floor",
                self.settings.relaxed_top_n,
                self.policy.relaxed_floor()
            );

            for (index, candidate) in candidates
                .iter()
                .enumerate()
                .take(self.settings.relaxed_top_n)
            {
                if accepted.len() >= max_images {
                    break;
                }
                if accepted_urls.contains(candidate.image_url.as_str()) || unusable.contains(&index)
                {
                    continue;
                }
                let image = match retained.remove(&index) {
                    Some(image) => image,
                    None => match self.fetch(candidate).await {
                        Ok(image) => image,
                        Err(_) => continue,
                    },
                };

                if self
                    .policy
                    .accepts(image.width, image.height, AcceptanceMode::Relaxed)
                {
                    match self.persist(candidate, &image).await {
                        Ok(record) => accepted.push(record),
                        Err(source) => return Err(partial_store(identifier, accepted, source)),
                    }
                    accepted_urls.insert(candidate.image_url.as_str());
                } else {
                    log::debug!(
                        "{identifier}: {} below relaxed floor ({}x{})",
                        candidate.image_url,
                        image.width,
                        image.height
                    );
                }
            }
        }

        if accepted.is_empty() {
            log::info!(
                "{identifier}: no acceptable images among {} candidate(s)",
                candidates.len()
            );
        } else {
            log::info!("{identifier}: accepted {} image(s)", accepted.len());
        }

        Ok(accepted)
    }

    async fn fetch(&self, candidate: &CandidateRecord) -> Result<FetchedImage, Rejection> {
        self.downloader
            .download(&candidate.image_url)
            .await
            .inspect_err(|e| {
                log::info!(
                    "{}: skipping {} from {}: {e}",
                    candidate.identifier,
                    candidate.image_url,
                    candidate.source
                );
            })
    }

    async fn persist(
        &self,
        candidate: &CandidateRecord,
        image: &FetchedImage,
    ) -> Result<CandidateRecord, StorageError> {
        let key = storage_key(
            self.settings.key_prefix.as_deref(),
            candidate,
            chrono::Utc::now().timestamp_millis(),
            &image.extension(&candidate.image_url),
        );
        let location = self.store.put(&key, &image.bytes).await?;
        log::debug!(
            "{}: stored {}x{} image from {} at {location}",
            candidate.identifier,
            image.width,
            image.height,
            candidate.source
        );

        let mut record = candidate.clone();
        record.local_path = Some(location);
        Ok(record)
    }

    /// Processes `identifiers` one at a time, pausing between them.
    ///
    /// A failing identifier is logged and recorded with no records, or
    /// with the records stored before a storage failure.
    /// Duplicates are processed once. Cancelling `cancel` stops the batch
    /// before the next identifier (or during the pause); identifiers
    /// already processed are kept.
    pub async fn run_batch(
        &self,
        identifiers: &[String],
        cancel: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> BatchResult {
        let total = identifiers.len();
        let mut result = BatchResult::new();
        let mut pace = false;
        progress.set_total(total as u64);

        for (i, identifier) in identifiers.iter().enumerate() {
            let identifier = identifier.trim();
            if cancel.is_cancelled() {
                log::warn!("Batch cancelled after {i} of {total} identifier(s)");
                break;
            }
            if result.contains(identifier) {
                log::info!("Skipping duplicate identifier {identifier}");
                progress.inc(1);
                continue;
            }

            if pace {
                tokio::select! {
                    () = cancel.cancelled() => {
                        log::warn!("Batch cancelled after {i} of {total} identifier(s)");
                        break;
                    }
                    () = tokio::time::sleep(self.settings.batch_pause) => {}
                }
            }

            progress.set_message(identifier.to_owned());
            log::info!("Processing SKU {}/{total}: {identifier}", i + 1);
            let records = match self.run(identifier).await {
                Ok(records) => records,
                Err(PipelineError::PartialStore { stored, source, .. }) => {
                    log::error!(
                        "Error processing SKU {identifier}: {source} (keeping {} stored image(s))",
                        stored.len()
                    );
                    stored
                }
                Err(e) => {
                    log::error!("Error processing SKU {identifier}: {e}");
                    Vec::new()
                }
            };
            result.push(identifier, records);
            progress.inc(1);
            pace = true;
        }

        let stats = result.statistics();
        progress.finish(format!(
            "{} image(s) for {} of {} SKU(s)",
            stats.total, stats.distinct_identifiers, total
        ));
        result
    }
}

fn partial_store(
    identifier: &str,
    stored: Vec<CandidateRecord>,
    source: StorageError,
) -> PipelineError {
    PipelineError::PartialStore {
        identifier: identifier.to_owned(),
        stored,
        source,
    }
}

/// Opens the storage backend selected in `config`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the backend is unavailable or
/// misconfigured.
pub fn open_store(config: &PipelineConfig) -> Result<Arc<dyn ArtifactStore>, PipelineError> {
    match config.storage {
        StorageBackend::Fs => Ok(Arc::new(FsStore::new(&config.output_dir))),
        #[cfg(feature = "r2")]
        StorageBackend::R2 => Ok(Arc::new(sku_finder_storage::r2::R2Store::from_env()?)),
        #[cfg(not(feature = "r2"))]
        StorageBackend::R2 => Err(PipelineError::BackendUnavailable {
            backend: config.storage.to_string(),
        }),
    }
}
