//! Usage data types.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Which side of the conversation a segment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// The live, not-yet-sent prompt input
    Prompt,
    /// Rendered response content
    Response,
}

/// One piece of conversation text, read at aggregation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub role: SegmentRole,
    pub text: String,
}

impl TextSegment {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            role: SegmentRole::Prompt,
            text: text.into(),
        }
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self {
            role: SegmentRole::Response,
            text: text.into(),
        }
    }
}

/// Usage band used to pick the indicator color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageBand {
    /// Below 50%
    Low,
    /// 50% up to (not including) 80%
    Mid,
    /// 80% and above
    High,
}

impl UsageBand {
    /// Classify a percentage in `[0, 100]`
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 50.0 {
            UsageBand::Low
        } else if percentage < 80.0 {
            UsageBand::Mid
        } else {
            UsageBand::High
        }
    }
}

/// Immutable result of one aggregation cycle.
///
/// `remaining_tokens` and `percentage` are derived from `used_tokens` and
/// `max_tokens` at construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    used_tokens: u64,
    max_tokens: u64,
    remaining_tokens: u64,
    percentage: f64,
    used_words: usize,
    segment_count: usize,
    prompt_tokens: u64,
    response_tokens: u64,
}

impl UsageSnapshot {
    /// Build a snapshot from a token total and the active limit
    pub fn new(used_tokens: u64, max_tokens: NonZeroU64) -> Self {
        let max = max_tokens.get();
        let percentage = (100.0 * used_tokens as f64 / max as f64).min(100.0);
        Self {
            used_tokens,
            max_tokens: max,
            remaining_tokens: max.saturating_sub(used_tokens),
            percentage,
            used_words: 0,
            segment_count: 0,
            prompt_tokens: 0,
            response_tokens: 0,
        }
    }

    /// Build a snapshot from per-role totals
    pub(crate) fn from_totals(totals: &SegmentTotals, max_tokens: NonZeroU64) -> Self {
        Self {
            used_words: totals.words,
            segment_count: totals.segments,
            prompt_tokens: totals.prompt_tokens,
            response_tokens: totals.response_tokens,
            ..Self::new(totals.prompt_tokens + totals.response_tokens, max_tokens)
        }
    }

    pub fn used_tokens(&self) -> u64 {
        self.used_tokens
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    pub fn remaining_tokens(&self) -> u64 {
        self.remaining_tokens
    }

    /// Share of the limit consumed, clamped to `[0, 100]`
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Total words across all segments
    pub fn used_words(&self) -> usize {
        self.used_words
    }

    /// Number of segments that contributed to this snapshot
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Tokens attributed to the prompt input
    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    /// Tokens attributed to response content
    pub fn response_tokens(&self) -> u64 {
        self.response_tokens
    }

    pub fn band(&self) -> UsageBand {
        UsageBand::from_percentage(self.percentage)
    }
}

/// Running per-role sums while segments are counted
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SegmentTotals {
    pub words: usize,
    pub segments: usize,
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}
