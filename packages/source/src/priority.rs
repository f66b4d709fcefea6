//! Source priority table used for ranking.
//!
//! Maps a record's source tag to an integer priority; higher wins and ties
//! are broken by confidence. Tags missing from the table rank lowest.

use std::collections::BTreeMap;

use crate::source_def::SourceDefinition;

/// Priority given to source tags that have no entry.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Static mapping from source tag to ranking priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePriority {
    priorities: BTreeMap<String, i32>,
}

impl SourcePriority {
    /// Builds the table from source definitions, keyed by source name.
    #[must_use]
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a SourceDefinition>) -> Self {
        Self {
            priorities: definitions
                .into_iter()
                .map(|def| (def.name.clone(), def.priority))
                .collect(),
        }
    }

    /// Adds or replaces one entry.
    #[must_use]
    pub fn with(mut self, source: &str, priority: i32) -> Self {
        self.priorities.insert(source.to_owned(), priority);
        self
    }

    /// Returns the priority of `source`, or [`DEFAULT_PRIORITY`] if unknown.
    #[must_use]
    pub fn priority_of(&self, source: &str) -> i32 {
        self.priorities
            .get(source)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Iterates over `(source, priority)` entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.priorities.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sources_rank_lowest() {
        let table = SourcePriority::default().with("Total Wine", 10);
        assert_eq!(table.priority_of("Total Wine"), 10);
        assert_eq!(table.priority_of("Somewhere Else"), DEFAULT_PRIORITY);
    }

    #[test]
    fn builds_from_registry() {
        let table = SourcePriority::from_definitions(&crate::registry::all_sources());
        assert_eq!(table.priority_of("Total Wine"), 10);
        assert_eq!(table.priority_of("BevMo"), 9);
        assert_eq!(table.priority_of("Walmart"), 8);
        assert_eq!(table.priority_of("Target"), 7);
        assert_eq!(table.priority_of("Open Food Facts"), 6);
        assert_eq!(table.priority_of("UPC Database"), 5);
        assert_eq!(table.priority_of("eBay"), 4);
        assert_eq!(table.priority_of("Barcode Lookup"), 3);
        assert_eq!(table.priority_of("Bing Images"), 2);
        assert_eq!(table.priority_of("Google Shopping"), 2);
        assert_eq!(table.priority_of("Google Images"), 1);
        assert_eq!(table.priority_of("DuckDuckGo Images"), 1);
        assert_eq!(table.priority_of("Go-UPC"), 5);
        assert_eq!(table.priority_of("Wine API"), 4);
        assert_eq!(table.priority_of("Spirits Database"), 3);
    }

    #[test]
    fn product_apis_outrank_image_search() {
        let sources = crate::registry::all_sources();
        let table = SourcePriority::from_definitions(&sources);
        let best_image_search = sources
            .iter()
            .filter(|s| s.kind == sku_finder_source_models::SourceKind::ImageSearch)
            .map(|s| table.priority_of(&s.name))
            .max()
            .unwrap();
        for api in sources
            .iter()
            .filter(|s| s.kind == sku_finder_source_models::SourceKind::OfficialApi)
        {
            assert!(
                table.priority_of(&api.name) > best_image_search,
                "{} ranks at or below image search",
                api.name
            );
        }
    }
}
