//! Industry relevance scoring from repository text metadata.

use std::collections::HashSet;

use repoharvest_shared::{Relevance, RepositoryRecord};

/// Scores repositories against a fixed keyword list.
///
/// A keyword counts as present when every one of its words appears,
/// case-insensitively, somewhere in the description or topics. Words are
/// split on anything that is not alphanumeric, so `real-time`, `Real time`
/// and the topic `real-time-dashboard` all contain `real` and `time`.
///
/// The score is the fraction of keywords present. Language plays no part;
/// the selector filters languages separately.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    keywords: Vec<Vec<String>>,
}

impl RelevanceScorer {
    pub fn new(keywords: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| words(k).collect::<Vec<_>>())
            .filter(|w| !w.is_empty())
            .collect();
        Self { keywords }
    }

    /// Relevance of one record.
    ///
    /// With no keywords configured every record scores 1.0. A record with no
    /// description and no topics scores 0.0.
    pub fn score(&self, record: &RepositoryRecord) -> Relevance {
        if self.keywords.is_empty() {
            return Relevance::MAX;
        }

        let haystack: HashSet<String> = record
            .description
            .iter()
            .chain(record.topics.iter())
            .flat_map(|text| words(text))
            .collect();

        if haystack.is_empty() {
            return Relevance::ZERO;
        }

        let found = self
            .keywords
            .iter()
            .filter(|kw| kw.iter().all(|w| haystack.contains(w)))
            .count();

        Relevance::new(found as f64 / self.keywords.len() as f64)
    }

    /// Attach a score to every record, preserving order.
    pub fn score_all(&self, records: Vec<RepositoryRecord>) -> Vec<RepositoryRecord> {
        records
            .into_iter()
            .map(|record| {
                let relevance = self.score(&record);
                tracing::trace!(id = %record.id, relevance = relevance.value(), "scored");
                record.with_relevance(relevance)
            })
            .collect()
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}
