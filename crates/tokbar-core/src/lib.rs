//! Core library for tokbar.
//!
//! Estimates how much of a token budget the text of a live conversation has
//! consumed, detects which budget applies from the active model label, and
//! decides when to recompute. Host documents and display surfaces are
//! collaborators behind the [`source::TextSource`] and
//! [`display::DisplayAdapter`] traits.

pub mod config;
pub mod display;
pub mod limits;
pub mod monitor;
pub mod source;
pub mod usage;

pub use config::MonitorSettings;
pub use display::{DisplayAdapter, IndicatorView, INDICATOR_ID};
pub use limits::{LimitDetector, LimitRule, LimitTable};
pub use monitor::{Monitor, MonitorState, RefreshScheduler, SchedulerHandle};
pub use source::{EventSender, Subscription, TextSource, Trigger};
pub use usage::{aggregate, count_words, estimate_tokens, UsageBand, UsageSnapshot};
