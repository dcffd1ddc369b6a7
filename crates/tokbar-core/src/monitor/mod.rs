//! The monitor: one aggregate/store/render cycle per accepted trigger.
//!
//! [`Monitor`] is synchronous and owns all per-instance state, so several
//! monitors can coexist. [`RefreshScheduler`] drives a monitor from a timer
//! and from source notifications on a single task, so cycles never overlap.

mod scheduler;
mod state;

pub use scheduler::{RefreshScheduler, SchedulerHandle};
pub use state::MonitorState;

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::MonitorSettings;
use crate::display::{self, DisplayAdapter, SurfaceStatus, INDICATOR_ID};
use crate::limits::{LimitChange, LimitDetector};
use crate::source::{EventSender, TextSource, Trigger};
use crate::usage::{aggregate, UsageSnapshot};

/// Token usage monitor for one text source and one display
pub struct Monitor {
    source: Box<dyn TextSource>,
    display: Box<dyn DisplayAdapter>,
    detector: LimitDetector,
    state: MonitorState,
    events: Option<EventSender>,
}

impl Monitor {
    pub fn new(
        settings: &MonitorSettings,
        source: Box<dyn TextSource>,
        display: Box<dyn DisplayAdapter>,
    ) -> Self {
        Self {
            source,
            display,
            detector: LimitDetector::new(settings.limit_table()),
            state: MonitorState::new(settings.initial_limit()),
            events: None,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn source(&self) -> &dyn TextSource {
        self.source.as_ref()
    }

    /// Subscribe to the source's change notifications
    pub fn attach(&mut self, events: EventSender) {
        if self.state.is_torn_down() {
            return;
        }
        self.state.structure_subscription = self.source.observe_structure(events.clone());
        if self.state.structure_subscription.is_none() {
            warn!("Structural change notifications unavailable; refreshing on the timer only");
        }
        self.events = Some(events);
        self.sync_prompt_subscription();
    }

    /// Start the periodic refresh timer. Requires a Tokio runtime and a
    /// prior [`attach`](Self::attach).
    pub fn start_timer(&mut self, period: Duration) {
        if self.state.is_torn_down() || self.state.timer.is_some() {
            return;
        }
        let Some(events) = self.events.clone() else {
            warn!("Refresh timer not started: monitor is not attached");
            return;
        };

        self.state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !events.send(Trigger::Tick) {
                    break;
                }
            }
        }));
    }

    /// Whether `trigger` should start a cycle.
    ///
    /// Mutations caused by the indicator itself are rejected, otherwise
    /// every render would schedule another render.
    pub fn accepts(&self, trigger: &Trigger) -> bool {
        if self.state.is_torn_down() {
            return false;
        }
        match trigger {
            Trigger::Structural { origin: Some(id) } if id == INDICATOR_ID => {
                debug!("Ignoring mutation caused by {}", id);
                false
            }
            _ => true,
        }
    }

    /// Run a cycle for `trigger` if it is accepted
    pub fn handle(&mut self, trigger: Trigger) -> Option<UsageSnapshot> {
        if !self.accepts(&trigger) {
            return None;
        }
        let cause = self.prepare(trigger);
        Some(self.run_cycle(&cause))
    }

    /// Re-check the model label and apply a changed limit.
    ///
    /// Returns true if the limit changed.
    pub fn refresh_limit(&mut self) -> bool {
        match self
            .detector
            .detect(self.source.as_ref(), self.state.max_tokens())
        {
            LimitChange::Changed { from, to, label } => {
                info!("Usage limit {} -> {} for model {:?}", from, to, label);
                self.state.set_limit(to, label);
                true
            }
            _ => false,
        }
    }

    /// Aggregate, store, and render one snapshot
    pub fn run_cycle(&mut self, cause: &Trigger) -> UsageSnapshot {
        let snapshot = aggregate(self.source.as_ref(), self.state.max_tokens());
        debug!(
            "Cycle ({}): {} / {} tokens ({:.1}%)",
            cause,
            snapshot.used_tokens(),
            snapshot.max_tokens(),
            snapshot.percentage()
        );
        self.state.record_cycle(snapshot.clone());

        match display::render(self.display.as_mut(), &snapshot) {
            Ok(SurfaceStatus::Created) => {
                debug!("Created indicator surface {}", INDICATOR_ID);
                self.state.mark_surface_created();
            }
            Ok(SurfaceStatus::Existing) => {}
            Err(e) => warn!("Indicator not rendered: {}", e),
        }
        snapshot
    }

    /// Stop the timer, drop all subscriptions, and remove the indicator.
    ///
    /// Safe to call repeatedly and on a monitor that was never attached.
    pub fn teardown(&mut self) {
        if let Some(timer) = self.state.timer.take() {
            timer.abort();
        }
        if let Some(mut sub) = self.state.structure_subscription.take() {
            sub.cancel();
        }
        if let Some(mut sub) = self.state.prompt_subscription.take() {
            sub.cancel();
        }
        self.events = None;

        self.display.remove_surface(INDICATOR_ID);
        self.state.mark_surface_removed();

        if !self.state.is_torn_down() {
            info!("Monitor stopped after {} cycles", self.state.cycles());
            self.state.mark_torn_down();
        }
    }

    /// Work done before a cycle; returns the cause to report
    fn prepare(&mut self, trigger: Trigger) -> Trigger {
        if matches!(trigger, Trigger::Initial | Trigger::Structural { .. }) {
            self.sync_prompt_subscription();
        }
        match trigger {
            Trigger::PromptEdited | Trigger::LimitChanged => trigger,
            _ if self.refresh_limit() => Trigger::LimitChanged,
            _ => trigger,
        }
    }

    /// Follow the prompt input as it appears and disappears
    fn sync_prompt_subscription(&mut self) {
        let Some(events) = self.events.clone() else {
            return;
        };
        let has_prompt = self.source.prompt_input().is_some();

        if self.state.observing_prompt() {
            if !has_prompt {
                debug!("Prompt input removed; dropping its edit subscription");
                self.state.prompt_subscription = None;
            }
        } else if has_prompt {
            self.state.prompt_subscription = self.source.observe_prompt(events);
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.teardown();
    }
}
