//! Fan-out over all adapters, merge, deduplicate, and rank.
//!
//! The [`Aggregator`] owns an ordered list of adapters. For each
//! identifier it invokes every adapter (sequentially, or concurrently when
//! enabled), concatenates their candidates in adapter order, and ranks them
//! with [`rank`]. Because ranking is a stable sort over a fixed
//! concatenation order, the output does not depend on which adapter
//! finished first.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use sku_finder_source_models::CandidateRecord;

use crate::priority::SourcePriority;
use crate::{SourceAdapter, search_soft};

/// Invokes adapters and ranks their merged output.
pub struct Aggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    priorities: SourcePriority,
    concurrent: bool,
}

impl Aggregator {
    /// Creates a sequential aggregator over `adapters` (in invocation
    /// order).
    #[must_use]
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, priorities: SourcePriority) -> Self {
        Self {
            adapters,
            priorities,
            concurrent: false,
        }
    }

    /// Runs adapters concurrently for each identifier when `concurrent` is
    /// set.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Returns the configured adapters.
    #[must_use]
    pub fn adapters(&self) -> &[Box<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Returns the priority table.
    #[must_use]
    pub const fn priorities(&self) -> &SourcePriority {
        &self.priorities
    }

    /// Collects candidates for `identifier` from every adapter and returns
    /// the top `max_results` by `(priority desc, confidence desc)`.
    ///
    /// Adapter failures and panics are logged and contribute nothing.
    pub async fn aggregate(&self, identifier: &str, max_results: usize) -> Vec<CandidateRecord> {
        let batches = if self.concurrent {
            futures::future::join_all(
                self.adapters
                    .iter()
                    .map(|adapter| invoke(adapter.as_ref(), identifier)),
            )
            .await
        } else {
            let mut batches = Vec::with_capacity(self.adapters.len());
            for adapter in &self.adapters {
                batches.push(invoke(adapter.as_ref(), identifier).await);
            }
            batches
        };

        let merged: Vec<CandidateRecord> = batches.into_iter().flatten().collect();
        let total = merged.len();
        let ranked = rank(merged, &self.priorities, max_results);
        log::info!(
            "{identifier}: {total} candidate(s) from {} source(s), keeping {}",
            self.adapters.len(),
            ranked.len()
        );
        ranked
    }
}

async fn invoke(adapter: &dyn SourceAdapter, identifier: &str) -> Vec<CandidateRecord> {
    match AssertUnwindSafe(search_soft(adapter, identifier))
        .catch_unwind()
        .await
    {
        Ok(records) => records,
        Err(_) => {
            log::error!("{}: adapter panicked while searching {identifier}", adapter.name());
            Vec::new()
        }
    }
}

/// Stable-sorts `records` by `(priority desc, confidence desc)`, drops
/// repeated image URLs, and keeps the first `max_results`.
///
/// Remaining ties keep their input order. When several sources offer the
/// same URL, only the highest-ranked copy survives.
#[must_use]
pub fn rank(
    mut records: Vec<CandidateRecord>,
    priorities: &SourcePriority,
    max_results: usize,
) -> Vec<CandidateRecord> {
    records.sort_by(|a, b| {
        priorities
            .priority_of(&b.source)
            .cmp(&priorities.priority_of(&a.source))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });

    let mut seen = BTreeSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.image_url.clone()))
        .take(max_results)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixedAdapter;

    fn record(source: &str, url: &str, confidence: f64) -> CandidateRecord {
        CandidateRecord::new("012000161155", source, url, "t", confidence)
    }

    fn table() -> SourcePriority {
        SourcePriority::default()
            .with("Total Wine", 10)
            .with("Walmart", 8)
            .with("Bing Images", 2)
    }

    fn is_ranked(records: &[CandidateRecord], table: &SourcePriority) -> bool {
        records.windows(2).all(|w| {
            let (pa, pb) = (table.priority_of(&w[0].source), table.priority_of(&w[1].source));
            pa > pb || (pa == pb && w[0].confidence >= w[1].confidence)
        })
    }

    #[test]
    fn ranks_regardless_of_input_order() {
        let base = vec![
            record("Bing Images", "b1", 0.6),
            record("Walmart", "w1", 0.8),
            record("Unknown", "u1", 1.0),
            record("Total Wine", "t1", 0.85),
            record("Walmart", "w2", 0.9),
        ];
        let table = table();
        let expected: Vec<String> = rank(base.clone(), &table, 10)
            .into_iter()
            .map(|r| r.image_url)
            .collect();
        assert_eq!(expected, vec!["t1", "w2", "w1", "b1", "u1"]);

        let mut reversed = base.clone();
        reversed.reverse();
        let mut rotated = base;
        rotated.rotate_left(2);
        for input in [reversed, rotated] {
            let ranked = rank(input, &table, 10);
            assert!(is_ranked(&ranked, &table));
            let urls: Vec<String> = ranked.into_iter().map(|r| r.image_url).collect();
            assert_eq!(urls, expected);
        }
    }

    #[test]
    fn truncates_to_top_k() {
        let records: Vec<CandidateRecord> = (0..12)
            .map(|i| {
                let source = if i % 2 == 0 { "Walmart" } else { "Bing Images" };
                record(source, &format!("u{i}"), 0.5 + f64::from(i) / 100.0)
            })
            .collect();
        let table = table();
        let full = rank(records.clone(), &table, usize::MAX);
        let top = rank(records, &table, 4);
        assert_eq!(top.len(), 4);
        assert_eq!(top, full[..4]);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let records = vec![record("Walmart", "first", 0.8), record("Walmart", "second", 0.8)];
        let ranked = rank(records, &table(), 5);
        assert_eq!(ranked[0].image_url, "first");
    }

    #[test]
    fn repeated_urls_keep_the_best_copy() {
        let records = vec![
            record("Bing Images", "same", 0.6),
            record("Walmart", "w1", 0.8),
            record("Total Wine", "same", 0.85),
            record("Walmart", "same", 0.9),
        ];
        let ranked = rank(records, &table(), 10);
        let offers: Vec<(&str, &str)> = ranked
            .iter()
            .map(|r| (r.source.as_str(), r.image_url.as_str()))
            .collect();
        assert_eq!(offers, vec![("Total Wine", "same"), ("Walmart", "w1")]);
    }

    #[test]
    fn repeated_urls_do_not_use_up_result_slots() {
        let records = vec![
            record("Walmart", "same", 0.9),
            record("Walmart", "same", 0.8),
            record("Walmart", "same", 0.7),
            record("Bing Images", "b1", 0.6),
        ];
        let ranked = rank(records, &table(), 2);
        let urls: Vec<&str> = ranked.iter().map(|r| r.image_url.as_str()).collect();
        assert_eq!(urls, vec!["same", "b1"]);
    }

    #[tokio::test]
    async fn survives_failing_and_panicking_adapters() {
        let aggregator = Aggregator::new(
            vec![
                Box::new(FixedAdapter::panicking("Broken")),
                Box::new(FixedAdapter::failing("Bing Images")),
                Box::new(FixedAdapter::ok("Walmart", &[("https://w/1.jpg", 0.8)])),
            ],
            table(),
        );
        let ranked = aggregator.aggregate("012000161155", 5).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source, "Walmart");
    }

    #[tokio::test]
    async fn concurrent_and_sequential_agree() {
        let adapters = || -> Vec<Box<dyn SourceAdapter>> {
            vec![
                Box::new(FixedAdapter::ok("Bing Images", &[("b", 0.6), ("b2", 0.6)])),
                Box::new(FixedAdapter::ok("Walmart", &[("w", 0.8)])),
                Box::new(FixedAdapter::ok("Total Wine", &[("t", 0.85)])),
            ]
        };
        let sequential = Aggregator::new(adapters(), table())
            .aggregate("012000161155", 3)
            .await;
        let concurrent = Aggregator::new(adapters(), table())
            .with_concurrency(true)
            .aggregate("012000161155", 3)
            .await;
        assert_eq!(sequential, concurrent);
        let urls: Vec<&str> = sequential.iter().map(|r| r.image_url.as_str()).collect();
        assert_eq!(urls, vec!["t", "w", "b"]);
    }
}
