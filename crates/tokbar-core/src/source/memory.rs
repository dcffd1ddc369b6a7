//! In-memory host document.
//!
//! [`MemoryDocument`] stands in for a live page: content can be mutated from
//! the outside at any time and every mutation notifies observers
//! synchronously. [`DocumentDisplay`] renders the indicator into the same
//! document, so its own insertions show up as structural changes just like
//! they would in a real page.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{EventSender, Subscription, TextSource};
use crate::display::{DisplayAdapter, DisplayError, IndicatorView, SurfaceStatus};

/// Extra node inserted into the document (e.g. the indicator)
#[derive(Debug, Clone)]
struct Node {
    id: String,
    text: String,
}

#[derive(Debug)]
struct DocumentInner {
    prompt: Option<String>,
    responses: Option<Vec<String>>,
    label: Option<String>,
    nodes: Vec<Node>,
    anchor_present: bool,
    structure_observers: Vec<(u64, EventSender)>,
    prompt_observers: Vec<(u64, EventSender)>,
    next_observer_id: u64,
}

/// Shared, mutable in-memory document. Clones refer to the same document.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    inner: Arc<Mutex<DocumentInner>>,
}

/// Which observer list a mutation notifies
#[derive(Clone, Copy)]
enum Change<'a> {
    Structural(Option<&'a str>),
    PromptEdit,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create an empty document with a response container and an anchor,
    /// but no prompt input or model label
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DocumentInner {
                prompt: None,
                responses: Some(Vec::new()),
                label: None,
                nodes: Vec::new(),
                anchor_present: true,
                structure_observers: Vec::new(),
                prompt_observers: Vec::new(),
                next_observer_id: 0,
            })),
        }
    }

    /// Set the prompt text, creating the prompt input if it does not exist.
    ///
    /// Creating the input is a structural change; editing an existing one
    /// is a prompt edit.
    pub fn set_prompt(&self, text: &str) {
        let created = {
            let mut inner = self.inner.lock();
            let created = inner.prompt.is_none();
            inner.prompt = Some(text.to_string());
            created
        };
        if created {
            self.notify(Change::Structural(None));
        } else {
            self.notify(Change::PromptEdit);
        }
    }

    /// Remove the prompt input. Existing prompt observers are dropped.
    pub fn remove_prompt(&self) {
        {
            let mut inner = self.inner.lock();
            inner.prompt = None;
            inner.prompt_observers.clear();
        }
        self.notify(Change::Structural(None));
    }

    pub fn push_response(&self, text: &str) {
        self.inner
            .lock()
            .responses
            .get_or_insert_with(Vec::new)
            .push(text.to_string());
        self.notify(Change::Structural(None));
    }

    /// Append streamed text to the last response (creating one if needed)
    pub fn append_response(&self, text: &str) {
        {
            let mut inner = self.inner.lock();
            let responses = inner.responses.get_or_insert_with(Vec::new);
            match responses.last_mut() {
                Some(last) => last.push_str(text),
                None => responses.push(text.to_string()),
            }
        }
        self.notify(Change::Structural(None));
    }

    pub fn clear_responses(&self) {
        if let Some(responses) = self.inner.lock().responses.as_mut() {
            responses.clear();
        }
        self.notify(Change::Structural(None));
    }

    /// Add or remove the response container itself
    pub fn set_response_container(&self, present: bool) {
        {
            let mut inner = self.inner.lock();
            if present {
                inner.responses.get_or_insert_with(Vec::new);
            } else {
                inner.responses = None;
            }
        }
        self.notify(Change::Structural(None));
    }

    pub fn set_label(&self, label: Option<&str>) {
        self.inner.lock().label = label.map(str::to_string);
        self.notify(Change::Structural(None));
    }

    /// Add or remove the anchor the indicator is inserted under
    pub fn set_anchor_present(&self, present: bool) {
        self.inner.lock().anchor_present = present;
    }

    pub fn anchor_present(&self) -> bool {
        self.inner.lock().anchor_present
    }

    /// Insert a node with the given id. Returns false if it already exists.
    pub fn insert_node(&self, id: &str) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.nodes.iter().any(|n| n.id == id) {
                return false;
            }
            inner.nodes.push(Node {
                id: id.to_string(),
                text: String::new(),
            });
        }
        self.notify(Change::Structural(Some(id)));
        true
    }

    /// Replace a node's text. Like replacing a text child, this is a
    /// structural change originating from that node.
    pub fn set_node_text(&self, id: &str, text: &str) -> bool {
        {
            let mut inner = self.inner.lock();
            match inner.nodes.iter_mut().find(|n| n.id == id) {
                Some(node) => node.text = text.to_string(),
                None => return false,
            }
        }
        self.notify(Change::Structural(Some(id)));
        true
    }

    pub fn remove_node(&self, id: &str) -> bool {
        {
            let mut inner = self.inner.lock();
            let before = inner.nodes.len();
            inner.nodes.retain(|n| n.id != id);
            if inner.nodes.len() == before {
                return false;
            }
        }
        self.notify(Change::Structural(Some(id)));
        true
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.inner.lock().nodes.iter().any(|n| n.id == id)
    }

    pub fn node_text(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.text.clone())
    }

    /// Number of nodes with the given id (at most one unless inserted twice)
    pub fn node_count(&self, id: &str) -> usize {
        self.inner.lock().nodes.iter().filter(|n| n.id == id).count()
    }

    pub fn structure_observer_count(&self) -> usize {
        self.inner.lock().structure_observers.len()
    }

    pub fn prompt_observer_count(&self) -> usize {
        self.inner.lock().prompt_observers.len()
    }

    fn notify(&self, change: Change<'_>) {
        // Collect senders first so observers never run under the lock
        let observers: Vec<EventSender> = {
            let inner = self.inner.lock();
            let list = match change {
                Change::Structural(_) => &inner.structure_observers,
                Change::PromptEdit => &inner.prompt_observers,
            };
            list.iter().map(|(_, events)| events.clone()).collect()
        };
        for events in observers {
            match change {
                Change::Structural(origin) => events.structural(origin),
                Change::PromptEdit => events.prompt_edited(),
            };
        }
    }

    fn add_observer(&self, events: EventSender, prompt: bool) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            if prompt {
                inner.prompt_observers.push((id, events));
            } else {
                inner.structure_observers.push((id, events));
            }
            id
        };

        let inner = self.inner.clone();
        Subscription::new(move || {
            let mut inner = inner.lock();
            inner.structure_observers.retain(|(i, _)| *i != id);
            inner.prompt_observers.retain(|(i, _)| *i != id);
        })
    }
}

impl TextSource for MemoryDocument {
    fn prompt_input(&self) -> Option<String> {
        self.inner.lock().prompt.clone()
    }

    fn responses(&self) -> Option<Vec<String>> {
        self.inner.lock().responses.clone()
    }

    fn model_label(&self) -> Option<String> {
        self.inner.lock().label.clone()
    }

    fn observe_structure(&self, events: EventSender) -> Option<Subscription> {
        Some(self.add_observer(events, false))
    }

    fn observe_prompt(&self, events: EventSender) -> Option<Subscription> {
        if self.inner.lock().prompt.is_none() {
            return None;
        }
        Some(self.add_observer(events, true))
    }
}

/// Display adapter that renders the indicator as a node of a [`MemoryDocument`]
#[derive(Debug, Clone)]
pub struct DocumentDisplay {
    document: MemoryDocument,
    last_view: Option<IndicatorView>,
}

impl DocumentDisplay {
    pub fn new(document: MemoryDocument) -> Self {
        Self {
            document,
            last_view: None,
        }
    }

    /// Last view rendered into the document
    pub fn last_view(&self) -> Option<&IndicatorView> {
        self.last_view.as_ref()
    }
}

impl DisplayAdapter for DocumentDisplay {
    fn ensure_surface(&mut self, id: &str) -> Result<SurfaceStatus, DisplayError> {
        if self.document.has_node(id) {
            return Ok(SurfaceStatus::Existing);
        }
        if !self.document.anchor_present() {
            return Err(DisplayError::MissingAnchor {
                id: id.to_string(),
            });
        }
        self.document.insert_node(id);
        Ok(SurfaceStatus::Created)
    }

    fn update(&mut self, id: &str, view: &IndicatorView) -> Result<(), DisplayError> {
        if !self.document.set_node_text(id, &view.label) {
            return Err(DisplayError::MissingSurface { id: id.to_string() });
        }
        self.last_view = Some(view.clone());
        Ok(())
    }

    fn remove_surface(&mut self, id: &str) {
        self.document.remove_node(id);
        self.last_view = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{trigger_channel, Trigger};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_structural_observers_receive_origin() {
        let doc = MemoryDocument::new();
        let (events, mut rx) = trigger_channel();
        let _sub = doc.observe_structure(events).unwrap();

        doc.push_response("hello");
        doc.insert_node("widget");

        assert_eq!(rx.try_recv().ok(), Some(Trigger::Structural { origin: None }));
        assert_eq!(
            rx.try_recv().ok(),
            Some(Trigger::Structural {
                origin: Some("widget".to_string())
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_prompt_observation_requires_prompt() {
        let doc = MemoryDocument::new();
        let (events, mut rx) = trigger_channel();
        assert!(doc.observe_prompt(events.clone()).is_none());

        doc.set_prompt("draft");
        let _sub = doc.observe_prompt(events).unwrap();
        doc.set_prompt("draft two");

        assert_eq!(rx.try_recv().ok(), Some(Trigger::PromptEdited));
    }

    #[test]
    fn test_cancel_removes_observer() {
        let doc = MemoryDocument::new();
        let (events, _rx) = trigger_channel();
        let mut sub = doc.observe_structure(events).unwrap();
        assert_eq!(doc.structure_observer_count(), 1);

        sub.cancel();
        assert_eq!(doc.structure_observer_count(), 0);
    }

    #[test]
    fn test_insert_node_is_idempotent() {
        let doc = MemoryDocument::new();
        assert!(doc.insert_node("a"));
        assert!(!doc.insert_node("a"));
        assert_eq!(doc.node_count("a"), 1);
        assert!(doc.remove_node("a"));
        assert!(!doc.remove_node("a"));
    }

    #[test]
    fn test_document_display_creates_surface_once() {
        let doc = MemoryDocument::new();
        let mut display = DocumentDisplay::new(doc.clone());

        assert_eq!(display.ensure_surface("bar").unwrap(), SurfaceStatus::Created);
        assert_eq!(display.ensure_surface("bar").unwrap(), SurfaceStatus::Existing);
        assert_eq!(doc.node_count("bar"), 1);
    }

    #[test]
    fn test_document_display_missing_anchor() {
        let doc = MemoryDocument::new();
        doc.set_anchor_present(false);
        let mut display = DocumentDisplay::new(doc.clone());

        assert!(matches!(
            display.ensure_surface("bar"),
            Err(DisplayError::MissingAnchor { .. })
        ));
        assert!(!doc.has_node("bar"));
    }
}
