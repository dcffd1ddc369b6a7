//! Display adapters: where a snapshot ends up on screen.
//!
//! Adapters own no estimation logic. [`render`] turns a snapshot into an
//! [`IndicatorView`] and hands it to the adapter, creating the indicator
//! surface first if it does not exist yet.

pub mod channel;

pub use channel::{display_channel, ChannelDisplay, IndicatorReceiver};

use serde::Serialize;
use thiserror::Error;

use crate::usage::{UsageBand, UsageSnapshot};

/// Stable id of the indicator surface
pub const INDICATOR_ID: &str = "tokbar-usage-indicator";

/// Errors raised by display adapters
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The anchor the indicator belongs under is not present
    #[error("anchor for surface {id} not found")]
    MissingAnchor { id: String },

    /// An update was attempted before the surface was created
    #[error("surface {id} does not exist")]
    MissingSurface { id: String },

    /// Nobody is listening to the display anymore
    #[error("display closed")]
    Closed,
}

/// Outcome of [`DisplayAdapter::ensure_surface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The surface was created by this call
    Created,
    /// The surface already existed
    Existing,
}

/// Everything an adapter needs to paint the indicator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorView {
    /// Bar fill in percent (0-100)
    pub fill_percent: f64,
    /// "<used> / <max> tokens | Remaining: <remaining>"
    pub label: String,
    /// Color band for the fill
    pub band: UsageBand,
    /// Tokens from the prompt input
    pub prompt_tokens: u64,
    /// Tokens from response content
    pub response_tokens: u64,
}

impl IndicatorView {
    pub fn from_snapshot(snapshot: &UsageSnapshot) -> Self {
        Self {
            fill_percent: snapshot.percentage(),
            label: format!(
                "{} / {} tokens | Remaining: {}",
                snapshot.used_tokens(),
                snapshot.max_tokens(),
                snapshot.remaining_tokens()
            ),
            band: snapshot.band(),
            prompt_tokens: snapshot.prompt_tokens(),
            response_tokens: snapshot.response_tokens(),
        }
    }
}

/// Rendering surface for the usage indicator
pub trait DisplayAdapter: Send {
    /// Make sure a surface with `id` exists, creating it only if it does not
    fn ensure_surface(&mut self, id: &str) -> Result<SurfaceStatus, DisplayError>;

    /// Paint `view` onto the surface. Painting the same view twice must
    /// leave the same visible state.
    fn update(&mut self, id: &str, view: &IndicatorView) -> Result<(), DisplayError>;

    /// Remove the surface if present (idempotent)
    fn remove_surface(&mut self, id: &str);
}

/// Render a snapshot onto the indicator surface
pub fn render(
    display: &mut dyn DisplayAdapter,
    snapshot: &UsageSnapshot,
) -> Result<SurfaceStatus, DisplayError> {
    let status = display.ensure_surface(INDICATOR_ID)?;
    display.update(INDICATOR_ID, &IndicatorView::from_snapshot(snapshot))?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    use crate::source::memory::{DocumentDisplay, MemoryDocument};
    use pretty_assertions::assert_eq;

    fn snapshot(used: u64, max: u64) -> UsageSnapshot {
        UsageSnapshot::new(used, NonZeroU64::new(max).unwrap())
    }

    #[test]
    fn test_view_label_format() {
        let view = IndicatorView::from_snapshot(&snapshot(40, 100));
        assert_eq!(view.label, "40 / 100 tokens | Remaining: 60");
        assert_eq!(view.fill_percent, 40.0);
        assert_eq!(view.band, UsageBand::Low);
    }

    #[test]
    fn test_view_over_limit() {
        let view = IndicatorView::from_snapshot(&snapshot(150, 100));
        assert_eq!(view.label, "150 / 100 tokens | Remaining: 0");
        assert_eq!(view.fill_percent, 100.0);
        assert_eq!(view.band, UsageBand::High);
    }

    #[test]
    fn test_view_mid_band() {
        let view = IndicatorView::from_snapshot(&snapshot(6_000, 8_192));
        assert_eq!(view.band, UsageBand::Mid);
    }

    #[test]
    fn test_render_is_idempotent() {
        let doc = MemoryDocument::new();
        let mut display = DocumentDisplay::new(doc.clone());
        let snap = snapshot(85, 100);

        assert_eq!(render(&mut display, &snap).unwrap(), SurfaceStatus::Created);
        let first = doc.node_text(INDICATOR_ID);
        assert_eq!(render(&mut display, &snap).unwrap(), SurfaceStatus::Existing);

        assert_eq!(doc.node_text(INDICATOR_ID), first);
        assert_eq!(doc.node_count(INDICATOR_ID), 1);
        assert_eq!(
            display.last_view().map(|v| v.band),
            Some(UsageBand::High)
        );
    }

    #[test]
    fn test_view_serializes_band_lowercase() {
        let view = IndicatorView::from_snapshot(&snapshot(60, 100));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["band"], "mid");
        assert_eq!(value["label"], "60 / 100 tokens | Remaining: 40");
    }
}
