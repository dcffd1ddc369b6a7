//! Ordered first-match limit table.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maps labels containing `match_token` to a token limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Case-insensitive substring to look for in the label
    #[serde(rename = "match")]
    pub match_token: String,
    /// Token limit for matching labels
    pub limit: u64,
}

impl LimitRule {
    pub fn new(match_token: impl Into<String>, limit: u64) -> Self {
        Self {
            match_token: match_token.into(),
            limit,
        }
    }
}

/// Built-in rule table
pub fn default_limit_rules() -> Vec<LimitRule> {
    vec![
        LimitRule::new("4o", 8192),
        LimitRule::new("o1-mini", 64000),
        LimitRule::new("o1", 32000),
    ]
}

/// A validated rule, with its token already lowercased
#[derive(Debug, Clone)]
struct CompiledRule {
    token: String,
    limit: NonZeroU64,
}

/// Rules evaluated strictly in order; the first rule whose token occurs in
/// the label wins, regardless of how specific later rules are.
#[derive(Debug, Clone)]
pub struct LimitTable {
    rules: Vec<CompiledRule>,
}

impl LimitTable {
    /// Build a table, dropping rules with an empty token or a zero limit
    pub fn new(rules: &[LimitRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                let token = rule.match_token.to_lowercase();
                if token.is_empty() {
                    warn!("Ignoring limit rule with empty match token");
                    return None;
                }
                let Some(limit) = NonZeroU64::new(rule.limit) else {
                    warn!("Ignoring limit rule {:?} with zero limit", rule.match_token);
                    return None;
                };
                Some(CompiledRule { token, limit })
            })
            .collect();
        Self { rules }
    }

    /// Resolve the limit for a label, or `None` if no rule matches
    pub fn resolve(&self, label: &str) -> Option<NonZeroU64> {
        let label = label.to_lowercase();
        self.rules
            .iter()
            .find(|rule| label.contains(&rule.token))
            .map(|rule| rule.limit)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for LimitTable {
    fn default() -> Self {
        Self::new(&default_limit_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolve(table: &LimitTable, label: &str) -> Option<u64> {
        table.resolve(label).map(NonZeroU64::get)
    }

    #[test]
    fn test_earlier_rule_wins() {
        let table = LimitTable::new(&[
            LimitRule::new("4o", 8192),
            LimitRule::new("o1-mini", 64000),
            LimitRule::new("o1", 32000),
        ]);
        assert_eq!(resolve(&table, "o1-mini-high"), Some(64000));
    }

    #[test]
    fn test_first_match_not_longest_match() {
        let table = LimitTable::new(&[LimitRule::new("o1", 32000), LimitRule::new("o1-mini", 64000)]);
        assert_eq!(resolve(&table, "o1-mini-high"), Some(32000));
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let table = LimitTable::default();
        assert_eq!(resolve(&table, "ChatGPT 4o"), Some(8192));
        assert_eq!(resolve(&table, "GPT-4O mini"), Some(8192));
        assert_eq!(resolve(&table, "O1-Preview"), Some(32000));

        let upper = LimitTable::new(&[LimitRule::new("SONNET", 200_000)]);
        assert_eq!(resolve(&upper, "claude-sonnet-4"), Some(200_000));
    }

    #[test]
    fn test_no_match() {
        let table = LimitTable::default();
        assert_eq!(resolve(&table, "gpt-3.5-turbo"), None);
        assert_eq!(resolve(&table, ""), None);
    }

    #[test]
    fn test_invalid_rules_are_dropped() {
        let table = LimitTable::new(&[
            LimitRule::new("", 100),
            LimitRule::new("zero", 0),
            LimitRule::new("ok", 10),
        ]);
        assert_eq!(table.len(), 1);
        // A dropped zero rule must not shadow later rules
        assert_eq!(resolve(&table, "zero-ok"), Some(10));
    }

    #[test]
    fn test_whitespace_in_token_is_kept() {
        let table = LimitTable::new(&[LimitRule::new(" mini", 128_000), LimitRule::new("4o", 8192)]);
        assert_eq!(table.len(), 2);
        assert_eq!(resolve(&table, "gpt-4o-mini"), Some(8192));
        assert_eq!(resolve(&table, "GPT-4o Mini"), Some(128_000));
    }

    #[test]
    fn test_rules_from_toml_keep_order() {
        #[derive(Deserialize)]
        struct Doc {
            limit_rules: Vec<LimitRule>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[limit_rules]]
            match = "o1"
            limit = 32000

            [[limit_rules]]
            match = "o1-mini"
            limit = 64000
        "#,
        )
        .unwrap();
        assert_eq!(doc.limit_rules[0], LimitRule::new("o1", 32000));
        let table = LimitTable::new(&doc.limit_rules);
        assert_eq!(resolve(&table, "o1-mini"), Some(32000));
    }
}
