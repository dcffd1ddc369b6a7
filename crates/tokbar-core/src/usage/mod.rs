//! Word counting and token estimation for the live conversation.
//!
//! The estimate is a heuristic proxy for tokenizer output: every text segment
//! is reduced to a word count, every word count to a token count, and the
//! per-segment counts are summed into one [`UsageSnapshot`].

pub mod aggregator;
pub mod counter;
pub mod types;

pub use aggregator::{aggregate, collect_segments};
pub use counter::{count_words, estimate_tokens, TOKENS_PER_WORD};
pub use types::{SegmentRole, TextSegment, UsageBand, UsageSnapshot};
