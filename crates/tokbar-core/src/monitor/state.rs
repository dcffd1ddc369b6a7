//! Per-monitor mutable state.

use std::num::NonZeroU64;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::source::Subscription;
use crate::usage::UsageSnapshot;

/// State owned by one [`Monitor`](super::Monitor).
///
/// Only the monitor's cycle and limit detection mutate it; everything
/// else reads it through the accessors.
#[derive(Debug)]
pub struct MonitorState {
    max_tokens: NonZeroU64,
    label: Option<String>,
    last_snapshot: Option<UsageSnapshot>,
    last_cycle_at: Option<DateTime<Utc>>,
    cycles: u64,
    surface_created: bool,
    torn_down: bool,
    pub(crate) timer: Option<JoinHandle<()>>,
    pub(crate) structure_subscription: Option<Subscription>,
    pub(crate) prompt_subscription: Option<Subscription>,
}

impl MonitorState {
    pub fn new(max_tokens: NonZeroU64) -> Self {
        Self {
            max_tokens,
            label: None,
            last_snapshot: None,
            last_cycle_at: None,
            cycles: 0,
            surface_created: false,
            torn_down: false,
            timer: None,
            structure_subscription: None,
            prompt_subscription: None,
        }
    }

    /// Limit the next snapshot is computed against
    pub fn max_tokens(&self) -> NonZeroU64 {
        self.max_tokens
    }

    /// Label that produced the current limit, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn last_snapshot(&self) -> Option<&UsageSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn last_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.last_cycle_at
    }

    /// Number of completed aggregation cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Whether the indicator surface has been created
    pub fn surface_created(&self) -> bool {
        self.surface_created
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn timer_active(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn observing_structure(&self) -> bool {
        self.structure_subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    pub fn observing_prompt(&self) -> bool {
        self.prompt_subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    pub(crate) fn set_limit(&mut self, max_tokens: NonZeroU64, label: String) {
        self.max_tokens = max_tokens;
        self.label = Some(label);
    }

    /// Replace the previous snapshot with the result of a finished cycle
    pub(crate) fn record_cycle(&mut self, snapshot: UsageSnapshot) {
        self.last_snapshot = Some(snapshot);
        self.last_cycle_at = Some(Utc::now());
        self.cycles += 1;
    }

    pub(crate) fn mark_surface_created(&mut self) {
        self.surface_created = true;
    }

    pub(crate) fn mark_surface_removed(&mut self) {
        self.surface_created = false;
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.torn_down = true;
    }
}
