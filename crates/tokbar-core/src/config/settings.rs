use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::time::Duration;
use tracing::warn;

use crate::limits::{default_limit_rules, LimitRule, LimitTable};

/// Limit used until a model label resolves to something else
pub const DEFAULT_TOKEN_LIMIT: u64 = 8192;

/// Period of the refresh timer
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 5000;

/// Monitor settings (top-level keys of the config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Pattern for the header line that opens the prompt input
    #[serde(default = "default_prompt_selector")]
    pub prompt_selector: String,

    /// Pattern for header lines that open response content
    #[serde(default = "default_response_content_selector")]
    pub response_content_selector: String,

    /// Pattern for the line carrying the model label.
    /// The named group `label` (or the first group) is the label text.
    #[serde(default = "default_model_label_selector")]
    pub model_label_selector: String,

    /// Pattern for any other block header (e.g. user turns)
    #[serde(default = "default_block_selector")]
    pub block_selector: String,

    /// Initial token limit
    #[serde(default = "default_token_limit")]
    pub token_limit: u64,

    /// Refresh timer period in milliseconds
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,

    /// Fold triggers that queue up during a cycle into one follow-up cycle
    #[serde(default)]
    pub coalesce_mutations: bool,

    /// Ordered limit rules; the first matching rule wins
    #[serde(default = "default_limit_rules")]
    pub limit_rules: Vec<LimitRule>,
}

fn default_prompt_selector() -> String {
    "^>>>".to_string()
}

fn default_response_content_selector() -> String {
    r"(?i)^###\s*(assistant|response)\b".to_string()
}

fn default_model_label_selector() -> String {
    r"(?i)^model:\s*(?P<label>.+)$".to_string()
}

fn default_block_selector() -> String {
    r"^#{1,6}\s".to_string()
}

fn default_token_limit() -> u64 {
    DEFAULT_TOKEN_LIMIT
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            prompt_selector: default_prompt_selector(),
            response_content_selector: default_response_content_selector(),
            model_label_selector: default_model_label_selector(),
            block_selector: default_block_selector(),
            token_limit: default_token_limit(),
            update_interval_ms: default_update_interval(),
            coalesce_mutations: false,
            limit_rules: default_limit_rules(),
        }
    }
}

impl MonitorSettings {
    /// Validate and normalize settings values
    ///
    /// Guarantees a non-zero token limit and timer period, and drops limit
    /// rules that could never apply.
    pub fn validate(&mut self) {
        const MIN_UPDATE_INTERVAL: u64 = 1;

        if self.token_limit == 0 {
            warn!(
                "token_limit must be positive; using {}",
                DEFAULT_TOKEN_LIMIT
            );
            self.token_limit = DEFAULT_TOKEN_LIMIT;
        }
        if self.update_interval_ms < MIN_UPDATE_INTERVAL {
            warn!("update_interval_ms must be positive; using {}", MIN_UPDATE_INTERVAL);
            self.update_interval_ms = MIN_UPDATE_INTERVAL;
        }
        self.limit_rules.retain(|rule| {
            let keep = !rule.match_token.is_empty() && rule.limit > 0;
            if !keep {
                warn!("Dropping invalid limit rule {:?}", rule);
            }
            keep
        });
    }

    /// Initial limit (falls back to the default if unvalidated and zero)
    pub fn initial_limit(&self) -> NonZeroU64 {
        NonZeroU64::new(self.token_limit)
            .or(NonZeroU64::new(DEFAULT_TOKEN_LIMIT))
            .unwrap_or(NonZeroU64::MIN)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    pub fn limit_table(&self) -> LimitTable {
        LimitTable::new(&self.limit_rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.token_limit, 8192);
        assert_eq!(settings.update_interval_ms, 5000);
        assert!(!settings.coalesce_mutations);
        assert_eq!(settings.limit_rules.len(), 3);
        assert_eq!(settings.limit_rules[0].match_token, "4o");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            token_limit = 4096
            update_interval_ms = 1000

            [[limit_rules]]
            match = "sonnet"
            limit = 200000
        "#;

        let settings: MonitorSettings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.token_limit, 4096);
        assert_eq!(settings.update_interval(), Duration::from_millis(1000));
        assert_eq!(settings.limit_rules, vec![LimitRule::new("sonnet", 200000)]);
        assert_eq!(settings.prompt_selector, "^>>>");
    }

    #[test]
    fn test_validate_normalizes() {
        let mut settings = MonitorSettings {
            token_limit: 0,
            update_interval_ms: 0,
            limit_rules: vec![
                LimitRule::new("", 10),
                LimitRule::new("zero", 0),
                LimitRule::new("o1", 32000),
            ],
            ..MonitorSettings::default()
        };
        settings.validate();

        assert_eq!(settings.token_limit, DEFAULT_TOKEN_LIMIT);
        assert_eq!(settings.update_interval_ms, 1);
        assert_eq!(settings.limit_rules, vec![LimitRule::new("o1", 32000)]);
        assert_eq!(settings.initial_limit().get(), DEFAULT_TOKEN_LIMIT);
    }

    #[test]
    fn test_initial_limit_without_validation() {
        let settings = MonitorSettings {
            token_limit: 0,
            ..MonitorSettings::default()
        };
        assert_eq!(settings.initial_limit().get(), DEFAULT_TOKEN_LIMIT);
    }
}
