//! Category filter composition.
//!
//! Categories are stored either as a single topic (`"soil"`) or as a
//! precomputed multi-topic string (`"irrigation,soil"`). A topic list matches
//! an entry whose category equals any one topic, or equals all topics joined
//! with `,` in the given order.

use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFilter {
    accepted: Vec<String>,
}

impl CategoryFilter {
    /// Build the filter for `topics`. `None` when there is nothing to restrict.
    pub fn from_topics(topics: &[String]) -> Option<Self> {
        if topics.is_empty() {
            return None;
        }
        let mut accepted = topics.to_vec();
        accepted.push(topics.join(","));
        Some(Self { accepted })
    }

    /// SQL predicate over `index_entries` aliased as `e`, using positional `?`
    /// placeholders bound by [`Self::sql_params`].
    pub(crate) fn sql_predicate(&self) -> String {
        let placeholders = vec!["?"; self.accepted.len()].join(", ");
        format!("json_extract(e.metadata, '$.category') IN ({placeholders})")
    }

    pub(crate) fn sql_params(&self) -> impl Iterator<Item = Value> + '_ {
        self.accepted.iter().map(|c| Value::Text(c.clone()))
    }
}
