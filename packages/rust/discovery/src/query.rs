//! Query composition: base query + industry keyword expansion + structured filters.

use chrono::{DateTime, NaiveDate, Utc};

use repoharvest_shared::SearchCriteria;

/// Structured filters that travel alongside the composed query text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Language allow-list; empty allows every language.
    pub languages: Vec<String>,
    /// Minimum star count (0 disables the qualifier).
    pub min_stars: u32,
    /// Only repositories pushed on or after this date.
    pub pushed_after: Option<NaiveDate>,
}

impl SearchFilters {
    /// Case-insensitive language membership test.
    ///
    /// A repository without a detected language only passes an empty allow-list.
    pub fn allows_language(&self, language: Option<&str>) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        language.is_some_and(|lang| self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang)))
    }

    /// Host search qualifiers, in a fixed order.
    pub fn qualifiers(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .languages
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| format!("language:{}", quote_if_spaced(l)))
            .collect();

        if self.min_stars > 0 {
            out.push(format!("stars:>={}", self.min_stars));
        }
        if let Some(date) = self.pushed_after {
            out.push(format!("pushed:>={}", date.format("%Y-%m-%d")));
        }
        out
    }
}

/// Output of the query builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedQuery {
    /// Base query with the keyword expansion appended.
    pub text: String,
    pub filters: SearchFilters,
}

impl ComposedQuery {
    /// Full `q=` value sent to the host: text followed by qualifiers.
    pub fn host_query(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }
        parts.extend(self.filters.qualifiers());
        parts.join(" ")
    }
}

/// Compose the query for a run. `now` anchors the recency window.
///
/// Keywords keep their configured order so identical configuration always
/// yields an identical query.
pub fn build_query(criteria: &SearchCriteria, now: DateTime<Utc>) -> ComposedQuery {
    let mut text_parts: Vec<String> = Vec::new();

    let base = criteria.query.trim();
    if !base.is_empty() {
        text_parts.push(base.to_string());
    }

    if criteria.expand_keywords {
        if let Some(expansion) = keyword_expansion(&criteria.industry_keywords) {
            text_parts.push(expansion);
        }
    }

    let query = ComposedQuery {
        text: text_parts.join(" "),
        filters: SearchFilters {
            languages: criteria.languages.clone(),
            min_stars: criteria.min_stars,
            pushed_after: criteria.date_range.map(|r| r.cutoff(now)),
        },
    };

    tracing::debug!(query = %query.host_query(), "composed search query");
    query
}

/// OR-join keywords: `kw`, or `(kw1 OR "multi word" OR kw3)`.
fn keyword_expansion(keywords: &[String]) -> Option<String> {
    let terms: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(quote_if_spaced)
        .collect();

    match terms.len() {
        0 => None,
        1 => terms.into_iter().next(),
        _ => Some(format!("({})", terms.join(" OR "))),
    }
}

fn quote_if_spaced(term: &str) -> String {
    if term.chars().any(char::is_whitespace) {
        format!("\"{}\"", term.replace('"', ""))
    } else {
        term.to_string()
    }
}
