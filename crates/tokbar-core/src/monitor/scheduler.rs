use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Monitor;
use crate::config::MonitorSettings;
use crate::source::{trigger_channel, EventSender, Trigger, TriggerReceiver};

/// Drives a [`Monitor`] from its timer and source notifications.
///
/// All triggers go through one channel and are handled one at a time on a
/// single task, so a cycle always runs to completion before the next one
/// starts.
pub struct RefreshScheduler {
    monitor: Monitor,
    period: Duration,
    coalesce: bool,
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    events: EventSender,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Monitor>,
}

impl RefreshScheduler {
    pub fn new(monitor: Monitor, settings: &MonitorSettings) -> Self {
        Self {
            monitor,
            period: settings.update_interval(),
            coalesce: settings.coalesce_mutations,
        }
    }

    /// Start the scheduler in a background task
    pub fn start(self) -> SchedulerHandle {
        let (events, rx) = trigger_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(events.clone(), rx, shutdown_rx));

        SchedulerHandle {
            events,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        events: EventSender,
        mut rx: TriggerReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> Monitor {
        info!(
            "Monitor started (limit {}, refresh every {:?})",
            self.monitor.state().max_tokens(),
            self.period
        );
        self.monitor.attach(events);
        self.monitor.start_timer(self.period);
        self.monitor.handle(Trigger::Initial);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                trigger = rx.recv() => match trigger {
                    Some(trigger) => self.dispatch(trigger, &mut rx),
                    None => break,
                },
            }
        }

        self.monitor.teardown();
        self.monitor
    }

    /// Handle one trigger, or with coalescing, everything already queued
    fn dispatch(&mut self, trigger: Trigger, rx: &mut TriggerReceiver) {
        if !self.coalesce {
            self.monitor.handle(trigger);
            return;
        }

        let mut pending = vec![trigger];
        while let Ok(next) = rx.try_recv() {
            pending.push(next);
        }
        let queued = pending.len();

        // Prefer a cause that re-checks the label over a bare prompt edit
        let accepted: Vec<Trigger> = pending
            .into_iter()
            .filter(|t| self.monitor.accepts(t))
            .collect();
        let Some(cause) = accepted
            .iter()
            .find(|t| **t != Trigger::PromptEdited)
            .or(accepted.first())
            .cloned()
        else {
            return;
        };

        if queued > 1 {
            debug!("Coalesced {} queued triggers into one cycle", queued);
        }
        self.monitor.handle(cause);
    }
}

impl SchedulerHandle {
    /// Request an immediate refresh cycle
    pub fn refresh(&self) -> bool {
        self.events.send(Trigger::Manual)
    }

    /// Sender that feeds this scheduler's trigger queue
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the scheduler and tear the monitor down.
    ///
    /// Returns the monitor so its final state can be inspected.
    pub async fn stop(self) -> Option<Monitor> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!("Monitor task ended abnormally: {}", e);
                None
            }
        }
    }
}
