//! Aggregate the live text segments of a source into one snapshot.

use std::num::NonZeroU64;

use tracing::{debug, warn};

use super::counter::{count_words, estimate_tokens};
use super::types::{SegmentRole, SegmentTotals, TextSegment, UsageSnapshot};
use crate::source::TextSource;

/// Enumerate the current segments of a source.
///
/// The source is queried fresh on every call. A missing prompt input or
/// response container contributes nothing and is logged.
pub fn collect_segments(source: &dyn TextSource) -> Vec<TextSegment> {
    let mut segments = Vec::new();

    match source.prompt_input() {
        Some(text) => segments.push(TextSegment::prompt(text)),
        None => warn!("Prompt input not found; counting responses only"),
    }

    match source.responses() {
        Some(responses) => segments.extend(responses.into_iter().map(TextSegment::response)),
        None => warn!("Response content not found; counting prompt only"),
    }

    segments
}

/// Count every segment of `source` and build a snapshot against `max_tokens`.
///
/// Words and tokens are converted per segment and then summed, so rounding
/// happens once per segment rather than once over the total.
pub fn aggregate(source: &dyn TextSource, max_tokens: NonZeroU64) -> UsageSnapshot {
    let segments = collect_segments(source);
    let totals = tally(&segments);

    debug!(
        "Aggregated {} segments: {} words, {} tokens (prompt {}, responses {})",
        totals.segments,
        totals.words,
        totals.prompt_tokens + totals.response_tokens,
        totals.prompt_tokens,
        totals.response_tokens
    );

    UsageSnapshot::from_totals(&totals, max_tokens)
}

fn tally(segments: &[TextSegment]) -> SegmentTotals {
    segments
        .iter()
        .fold(SegmentTotals::default(), |mut totals, segment| {
            let words = count_words(&segment.text);
            let tokens = estimate_tokens(words);
            totals.words += words;
            totals.segments += 1;
            match segment.role {
                SegmentRole::Prompt => totals.prompt_tokens += tokens,
                SegmentRole::Response => totals.response_tokens += tokens,
            }
            totals
        })
}
