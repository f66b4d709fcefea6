#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Value types shared by the image pipeline and its callers.
//!
//! [`AcceptancePolicy`] decides whether an image is large enough,
//! [`BatchResult`] collects accepted records per identifier across a batch,
//! and [`RunStatistics`] summarizes a set of accepted records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sku_finder_source_models::CandidateRecord;
use strum_macros::{AsRefStr, Display, EnumString};

/// Default strict minimum width in pixels.
pub const DEFAULT_MIN_WIDTH: u32 = 300;

/// Default strict minimum height in pixels.
pub const DEFAULT_MIN_HEIGHT: u32 = 300;

/// Default relaxed floor applied to the smaller image dimension.
pub const DEFAULT_RELAXED_FLOOR: u32 = 150;

/// Errors raised when building pipeline configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The relaxed floor exceeds one of the strict minimums.
    #[error(
        "Relaxed floor {relaxed_floor} exceeds strict minimum {min_width}x{min_height}"
    )]
    RelaxedAboveStrict {
        /// Strict minimum width.
        min_width: u32,
        /// Strict minimum height.
        min_height: u32,
        /// Offending relaxed floor.
        relaxed_floor: u32,
    },

    /// A numeric setting was zero or otherwise out of range.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Setting name.
        name: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Which acceptance threshold to apply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AcceptanceMode {
    /// Both dimensions must meet the strict minimums.
    Strict,
    /// The smaller dimension must meet the relaxed floor.
    Relaxed,
}

/// Minimum image dimensions for acceptance.
///
/// The relaxed floor never exceeds either strict minimum, so anything that
/// passes strict also passes relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcceptancePolicy {
    min_width: u32,
    min_height: u32,
    relaxed_floor: u32,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            relaxed_floor: DEFAULT_RELAXED_FLOOR,
        }
    }
}

impl AcceptancePolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelaxedAboveStrict`] if `relaxed_floor` is
    /// larger than `min_width` or `min_height`.
    pub const fn new(
        min_width: u32,
        min_height: u32,
        relaxed_floor: u32,
    ) -> Result<Self, ConfigError> {
        if relaxed_floor > min_width || relaxed_floor > min_height {
            return Err(ConfigError::RelaxedAboveStrict {
                min_width,
                min_height,
                relaxed_floor,
            });
        }
        Ok(Self {
            min_width,
            min_height,
            relaxed_floor,
        })
    }

    /// Strict minimum width.
    #[must_use]
    pub const fn min_width(&self) -> u32 {
        self.min_width
    }

    /// Strict minimum height.
    #[must_use]
    pub const fn min_height(&self) -> u32 {
        self.min_height
    }

    /// Relaxed floor for the smaller dimension.
    #[must_use]
    pub const fn relaxed_floor(&self) -> u32 {
        self.relaxed_floor
    }

    /// Whether an image of `width` x `height` is acceptable under `mode`.
    #[must_use]
    pub const fn accepts(&self, width: u32, height: u32, mode: AcceptanceMode) -> bool {
        match mode {
            AcceptanceMode::Strict => width >= self.min_width && height >= self.min_height,
            AcceptanceMode::Relaxed => {
                let smaller = if width < height { width } else { height };
                smaller >= self.relaxed_floor
            }
        }
    }
}

/// Accepted records per identifier, in the order identifiers were
/// processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    entries: Vec<(String, Vec<CandidateRecord>)>,
    /// Position of each identifier in `entries`.
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl BatchResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the outcome for `identifier`.
    ///
    /// Returns `false` (and keeps the first outcome) if the identifier was
    /// already recorded.
    pub fn push(&mut self, identifier: &str, records: Vec<CandidateRecord>) -> bool {
        if self.index.contains_key(identifier) {
            return false;
        }
        self.index.insert(identifier.to_owned(), self.entries.len());
        self.entries.push((identifier.to_owned(), records));
        true
    }

    /// Returns the accepted records for `identifier`, if it was processed.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&[CandidateRecord]> {
        self.index
            .get(identifier)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, records)| records.as_slice())
    }

    /// Iterates `(identifier, records)` pairs in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CandidateRecord])> {
        self.entries
            .iter()
            .map(|(id, records)| (id.as_str(), records.as_slice()))
    }

    /// Iterates every accepted record across all identifiers, in order.
    pub fn records(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.entries.iter().flat_map(|(_, records)| records)
    }

    /// Whether `identifier` has already been recorded.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// Number of identifiers processed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identifier has been processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computes statistics over every accepted record.
    #[must_use]
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::from_records(self.records())
    }
}

/// Summary of a set of accepted records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    /// Number of accepted records.
    pub total: usize,
    /// Number of distinct identifiers with at least one record.
    pub distinct_identifiers: usize,
    /// Record count per source tag.
    pub per_source: BTreeMap<String, usize>,
    /// Mean confidence, or `0.0` when there are no records.
    pub mean_confidence: f64,
}

impl RunStatistics {
    /// Computes statistics over `records`.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CandidateRecord>) -> Self {
        let mut identifiers = std::collections::BTreeSet::new();
        let mut per_source = BTreeMap::new();
        let mut total = 0_usize;
        let mut confidence_sum = 0.0;

        for record in records {
            total += 1;
            confidence_sum += record.confidence;
            identifiers.insert(record.identifier.as_str());
            *per_source.entry(record.source.clone()).or_insert(0) += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let mean_confidence = if total == 0 {
            0.0
        } else {
            confidence_sum / total as f64
        };

        Self {
            total,
            distinct_identifiers: identifiers.len(),
            per_source,
            mean_confidence,
        }
    }
}
