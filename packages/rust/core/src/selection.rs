//! Filtering, deduplication, ranking, and truncation of scored records.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::info;

use repoharvest_shared::{
    RepoId, RepositoryRecord, SelectionConfig, SelectionResult, SelectionStats, SortKey,
};

/// Turns the scored search results into a bounded [`SelectionResult`].
///
/// 1. drop records outside the language allow-list, below `min_stars`, or
///    below `min_relevance` (each counted under the first rule it fails)
/// 2. drop repeated identifiers, keeping the first occurrence
/// 3. sort descending by the configured key, ties by identifier ascending
/// 4. truncate to `max_repositories`
#[derive(Debug, Clone)]
pub struct Selector {
    config: SelectionConfig,
}

impl Selector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn select(&self, records: Vec<RepositoryRecord>) -> SelectionResult {
        let mut stats = SelectionStats {
            candidates: records.len(),
            ..SelectionStats::default()
        };

        let mut seen: HashSet<RepoId> = HashSet::new();
        let mut kept: Vec<RepositoryRecord> = Vec::with_capacity(records.len());

        for record in records {
            if !self.language_allowed(record.language.as_deref()) {
                stats.dropped_language += 1;
            } else if record.stars < self.config.min_stars {
                stats.dropped_below_stars += 1;
            } else if record.relevance.value() < self.config.min_relevance {
                stats.dropped_below_relevance += 1;
            } else if !seen.insert(record.id.clone()) {
                stats.dropped_duplicates += 1;
            } else {
                kept.push(record);
            }
        }

        let key = self.config.sort_by;
        kept.sort_by(|a, b| rank(key, a, b));

        if kept.len() > self.config.max_repositories {
            stats.dropped_over_cap = kept.len() - self.config.max_repositories;
            kept.truncate(self.config.max_repositories);
        }

        info!(
            candidates = stats.candidates,
            selected = kept.len(),
            dropped_language = stats.dropped_language,
            dropped_below_stars = stats.dropped_below_stars,
            dropped_below_relevance = stats.dropped_below_relevance,
            dropped_duplicates = stats.dropped_duplicates,
            dropped_over_cap = stats.dropped_over_cap,
            "selection complete"
        );

        SelectionResult {
            selected: kept,
            stats,
        }
    }

    fn language_allowed(&self, language: Option<&str>) -> bool {
        if self.config.languages.is_empty() {
            return true;
        }
        language.is_some_and(|lang| {
            self.config
                .languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(lang))
        })
    }
}

/// Descending by `key`, then ascending by identifier.
fn rank(key: SortKey, a: &RepositoryRecord, b: &RepositoryRecord) -> Ordering {
    let primary = match key {
        SortKey::Stars => b.stars.cmp(&a.stars),
        SortKey::Relevance => b.relevance.value().total_cmp(&a.relevance.value()),
        SortKey::Updated => b.updated_at.cmp(&a.updated_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use repoharvest_discovery::testing::repo;
    use repoharvest_shared::Relevance;

    fn config(min_stars: u32, min_relevance: f64, sort_by: SortKey, max: usize) -> SelectionConfig {
        SelectionConfig {
            min_stars,
            min_relevance,
            sort_by,
            max_repositories: max,
            languages: Vec::new(),
        }
    }

    fn ids(result: &SelectionResult) -> Vec<&str> {
        result.selected.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn twelve_candidates_top_five_by_stars() {
        let records = vec![
            repo("o/a", 5),
            repo("o/b", 50),
            repo("o/c", 12),
            repo("o/d", 9),
            repo("o/e", 50),
            repo("o/f", 10),
            repo("o/g", 300),
            repo("o/h", 0),
            repo("o/i", 75),
            repo("o/j", 10),
            repo("o/k", 1),
            repo("o/l", 12),
        ];
        let result = Selector::new(config(10, 0.0, SortKey::Stars, 5)).select(records);

        assert_eq!(ids(&result), vec!["o/g", "o/i", "o/b", "o/e", "o/c"]);
        assert_eq!(result.stats.candidates, 12);
        assert_eq!(result.stats.dropped_below_stars, 4);
        assert_eq!(result.stats.dropped_over_cap, 3);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let first = RepositoryRecord {
            description: Some("first".into()),
            ..repo("o/dup", 20)
        };
        let second = RepositoryRecord {
            description: Some("second".into()),
            ..repo("o/dup", 999)
        };
        let result =
            Selector::new(config(0, 0.0, SortKey::Stars, 10)).select(vec![first, second]);

        assert_eq!(result.len(), 1);
        assert_eq!(result.selected[0].description.as_deref(), Some("first"));
        assert_eq!(result.stats.dropped_duplicates, 1);
    }

    #[test]
    fn filtered_duplicate_does_not_shadow_a_later_valid_one() {
        let weak = repo("o/dup", 1);
        let strong = repo("o/dup", 100);
        let result = Selector::new(config(10, 0.0, SortKey::Stars, 10)).select(vec![weak, strong]);

        assert_eq!(result.len(), 1);
        assert_eq!(result.selected[0].stars, 100);
        assert_eq!(result.stats.dropped_below_stars, 1);
        assert_eq!(result.stats.dropped_duplicates, 0);
    }

    #[test]
    fn relevance_threshold_and_relevance_sort() {
        let records = vec![
            repo("o/low", 500).with_relevance(Relevance::new(0.2)),
            repo("o/b", 10).with_relevance(Relevance::new(0.8)),
            repo("o/a", 20).with_relevance(Relevance::new(0.8)),
            repo("o/top", 1).with_relevance(Relevance::MAX),
        ];
        let result = Selector::new(config(0, 0.5, SortKey::Relevance, 10)).select(records);

        assert_eq!(ids(&result), vec!["o/top", "o/a", "o/b"]);
        assert_eq!(result.stats.dropped_below_relevance, 1);
    }

    #[test]
    fn updated_sort_uses_timestamp() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let old = RepositoryRecord {
            updated_at: base,
            ..repo("o/old", 999)
        };
        let new = RepositoryRecord {
            updated_at: base + Duration::days(30),
            ..repo("o/new", 1)
        };
        let result = Selector::new(config(0, 0.0, SortKey::Updated, 10)).select(vec![old, new]);
        assert_eq!(ids(&result), vec!["o/new", "o/old"]);
    }

    #[test]
    fn language_allow_list_is_applied() {
        let python = RepositoryRecord {
            language: Some("Python".into()),
            ..repo("o/py", 50)
        };
        let unknown = RepositoryRecord {
            language: None,
            ..repo("o/none", 50)
        };
        let mut cfg = config(0, 0.0, SortKey::Stars, 10);
        cfg.languages = vec!["rust".into()];

        let result = Selector::new(cfg).select(vec![python, unknown, repo("o/rs", 1)]);
        assert_eq!(ids(&result), vec!["o/rs"]);
        assert_eq!(result.stats.dropped_language, 2);
    }

    #[test]
    fn selection_is_deterministic() {
        let records: Vec<_> = (0..20)
            .map(|i| repo(&format!("o/r{i:02}"), (i % 4) * 10))
            .collect();
        let mut reversed = records.clone();
        reversed.reverse();

        let selector = Selector::new(config(0, 0.0, SortKey::Stars, 7));
        let a = selector.select(records);
        let b = selector.select(reversed);
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(selector.select(a.selected.clone()).selected, a.selected);
    }
}
