//! Text sources: the live host document the monitor reads from.
//!
//! A [`TextSource`] answers "what text is there right now" and lets the
//! monitor subscribe to change notifications. Notifications are delivered as
//! [`Trigger`]s through an [`EventSender`]; every trigger kind feeds the same
//! refresh cycle.

pub mod memory;
pub mod transcript;

pub use memory::{DocumentDisplay, MemoryDocument};
pub use transcript::{parse_transcript, Transcript, TranscriptSelectors, TranscriptSource};

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while setting up or reading a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing document could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configured selector pattern is not a valid regex
    #[error("invalid {name}: {source}")]
    InvalidSelector {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// The change watcher could not be installed
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Why a refresh cycle was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// First cycle after the monitor starts
    Initial,
    /// Periodic timer tick
    Tick,
    /// Nodes were added to or removed from the observed document.
    ///
    /// `origin` carries the id of the node whose insertion or update caused
    /// the change, when the source knows it.
    Structural { origin: Option<String> },
    /// The prompt input was edited
    PromptEdited,
    /// The active usage limit changed
    LimitChanged,
    /// Explicit refresh requested by the user
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Initial => write!(f, "initial"),
            Trigger::Tick => write!(f, "tick"),
            Trigger::Structural { origin: Some(id) } => write!(f, "structural ({})", id),
            Trigger::Structural { origin: None } => write!(f, "structural"),
            Trigger::PromptEdited => write!(f, "prompt edit"),
            Trigger::LimitChanged => write!(f, "limit change"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// Receiving side of the trigger channel
pub type TriggerReceiver = mpsc::UnboundedReceiver<Trigger>;

/// Handle sources use to request refresh cycles.
///
/// Sending never blocks, so it is safe to call from watcher threads and
/// from inside document mutation callbacks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Trigger>,
}

/// Create a trigger channel
pub fn trigger_channel() -> (EventSender, TriggerReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

impl EventSender {
    /// Report a structural change, optionally naming the node that caused it.
    ///
    /// Returns false once the receiving monitor is gone.
    pub fn structural(&self, origin: Option<&str>) -> bool {
        self.send(Trigger::Structural {
            origin: origin.map(str::to_string),
        })
    }

    /// Report an edit of the prompt input
    pub fn prompt_edited(&self) -> bool {
        self.send(Trigger::PromptEdited)
    }

    pub fn send(&self, trigger: Trigger) -> bool {
        self.tx.send(trigger).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An active change subscription.
///
/// Cancelling runs the source's unsubscribe action exactly once; dropping an
/// uncancelled subscription cancels it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Stop receiving notifications (idempotent)
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Live host document providing conversation text and change notifications.
///
/// Every read reflects the document at the time of the call; callers must
/// not assume two reads see the same content.
pub trait TextSource: Send {
    /// Current text of the prompt input, or `None` if there is none
    fn prompt_input(&self) -> Option<String>;

    /// Rendered text of every response element, or `None` if the response
    /// container cannot be found
    fn responses(&self) -> Option<Vec<String>>;

    /// Text of the active model label, or `None` if it cannot be found
    fn model_label(&self) -> Option<String>;

    /// Subscribe to structural changes (nodes added or removed) of the
    /// conversation content. `None` means observation is unavailable.
    fn observe_structure(&self, events: EventSender) -> Option<Subscription>;

    /// Subscribe to edits of the prompt input. `None` means there is no
    /// prompt input to observe right now.
    fn observe_prompt(&self, events: EventSender) -> Option<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.cancel();
        sub.cancel();
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_cancels_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_sender_reports_closed_receiver() {
        let (events, mut rx) = trigger_channel();
        assert!(events.structural(Some("node")));
        assert_eq!(
            rx.try_recv().ok(),
            Some(Trigger::Structural {
                origin: Some("node".to_string())
            })
        );

        drop(rx);
        assert!(events.is_closed());
        assert!(!events.prompt_edited());
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(Trigger::Tick.to_string(), "tick");
        assert_eq!(
            Trigger::Structural { origin: None }.to_string(),
            "structural"
        );
    }
}
