//! Detect the active usage limit from the source's model label.

use std::num::NonZeroU64;

use tracing::{debug, warn};

use super::rules::LimitTable;
use crate::source::TextSource;

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitChange {
    /// The label resolved to a different limit
    Changed {
        from: NonZeroU64,
        to: NonZeroU64,
        label: String,
    },
    /// The label resolved to the current limit
    Unchanged,
    /// No rule matched the label; the current limit stays
    NoMatch { label: String },
    /// The label could not be found; detection was skipped
    LabelMissing,
}

impl LimitChange {
    /// The new limit, if it changed
    pub fn new_limit(&self) -> Option<NonZeroU64> {
        match self {
            LimitChange::Changed { to, .. } => Some(*to),
            _ => None,
        }
    }
}

/// Resolves the model label of a source against a [`LimitTable`]
#[derive(Debug, Clone, Default)]
pub struct LimitDetector {
    table: LimitTable,
}

impl LimitDetector {
    pub fn new(table: LimitTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LimitTable {
        &self.table
    }

    /// Compare the limit for the current label against `current`
    pub fn detect(&self, source: &dyn TextSource, current: NonZeroU64) -> LimitChange {
        let Some(label) = source.model_label() else {
            warn!("Model label not found; keeping limit {}", current);
            return LimitChange::LabelMissing;
        };
        self.evaluate(label.trim(), current)
    }

    /// Compare the limit for `label` against `current`
    pub fn evaluate(&self, label: &str, current: NonZeroU64) -> LimitChange {
        match self.table.resolve(label) {
            Some(limit) if limit != current => LimitChange::Changed {
                from: current,
                to: limit,
                label: label.to_string(),
            },
            Some(_) => LimitChange::Unchanged,
            None => {
                debug!("No limit rule matches label {:?}", label);
                LimitChange::NoMatch {
                    label: label.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::LimitRule;
    use crate::source::memory::MemoryDocument;
    use pretty_assertions::assert_eq;

    fn limit(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn test_changed_limit() {
        let detector = LimitDetector::default();
        let doc = MemoryDocument::new();
        doc.set_label(Some("o1-mini-high"));

        let change = detector.detect(&doc, limit(8192));
        assert_eq!(
            change,
            LimitChange::Changed {
                from: limit(8192),
                to: limit(64000),
                label: "o1-mini-high".to_string(),
            }
        );
        assert_eq!(change.new_limit(), Some(limit(64000)));
    }

    #[test]
    fn test_same_limit_is_unchanged() {
        let detector = LimitDetector::default();
        assert_eq!(detector.evaluate("GPT-4o", limit(8192)), LimitChange::Unchanged);
    }

    #[test]
    fn test_no_match_keeps_limit() {
        let detector = LimitDetector::default();
        let change = detector.evaluate("gpt-3.5", limit(4096));
        assert!(matches!(change, LimitChange::NoMatch { .. }));
        assert_eq!(change.new_limit(), None);
    }

    #[test]
    fn test_missing_label_is_skipped() {
        let detector = LimitDetector::default();
        let doc = MemoryDocument::new();
        assert_eq!(detector.detect(&doc, limit(8192)), LimitChange::LabelMissing);
    }

    #[test]
    fn test_label_is_trimmed() {
        let detector = LimitDetector::new(LimitTable::new(&[LimitRule::new("o1", 32000)]));
        let doc = MemoryDocument::new();
        doc.set_label(Some("  o1\n"));
        assert_eq!(detector.detect(&doc, limit(32000)), LimitChange::Unchanged);
    }
}
