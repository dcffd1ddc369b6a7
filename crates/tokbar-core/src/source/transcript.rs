//! File-backed conversation transcript.
//!
//! The transcript is a plain text file split into blocks by header lines.
//! Which headers open a response, the prompt input, or any other block is
//! decided by the configured selector patterns:
//!
//! ```text
//! model: gpt-4o
//! ## user
//! How do I read a file in Rust?
//! ### assistant
//! Use std::fs::read_to_string.
//! >>> and what about
//! large files?
//! ```
//!
//! The file is re-read on every query. Change observation watches the
//! parent directory so editors that save through a rename are still seen.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use super::{EventSender, SourceError, Subscription, TextSource};
use crate::config::MonitorSettings;

/// Compiled selector patterns
#[derive(Debug, Clone)]
pub struct TranscriptSelectors {
    prompt: Regex,
    response: Regex,
    label: Regex,
    block: Regex,
}

impl TranscriptSelectors {
    pub fn from_settings(settings: &MonitorSettings) -> Result<Self, SourceError> {
        Ok(Self {
            prompt: compile("prompt_selector", &settings.prompt_selector)?,
            response: compile(
                "response_content_selector",
                &settings.response_content_selector,
            )?,
            label: compile("model_label_selector", &settings.model_label_selector)?,
            block: compile("block_selector", &settings.block_selector)?,
        })
    }

    fn classify(&self, line: &str) -> Option<BlockKind> {
        if self.response.is_match(line) {
            Some(BlockKind::Response)
        } else if self.prompt.is_match(line) {
            Some(BlockKind::Prompt)
        } else if self.block.is_match(line) {
            Some(BlockKind::Other)
        } else {
            None
        }
    }
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, SourceError> {
    Regex::new(pattern).map_err(|source| SourceError::InvalidSelector { name, source })
}

/// Kind of a transcript block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Prompt,
    Response,
    Other,
}

/// Parsed view of a transcript at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Kinds of all blocks in document order
    pub layout: Vec<BlockKind>,
    /// Text of each response block
    pub responses: Vec<String>,
    /// Text of the last prompt block
    pub prompt: Option<String>,
    /// Last model label found
    pub label: Option<String>,
}

/// How a transcript differs from an earlier parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptChange {
    Unchanged,
    /// Blocks, label, or response content changed
    Structural,
    /// Only the prompt text changed
    PromptEdited,
}

impl Transcript {
    pub fn change_from(&self, previous: &Transcript) -> TranscriptChange {
        if self.layout != previous.layout
            || self.label != previous.label
            || self.responses != previous.responses
        {
            TranscriptChange::Structural
        } else if self.prompt != previous.prompt {
            TranscriptChange::PromptEdited
        } else {
            TranscriptChange::Unchanged
        }
    }
}

fn classify_change(previous: Option<&Transcript>, current: Option<&Transcript>) -> TranscriptChange {
    match (previous, current) {
        (Some(previous), Some(current)) => current.change_from(previous),
        (None, None) => TranscriptChange::Unchanged,
        _ => TranscriptChange::Structural,
    }
}

/// Split transcript text into blocks.
///
/// Label lines are metadata and never part of a block. Text before the
/// first header belongs to no block.
pub fn parse_transcript(text: &str, selectors: &TranscriptSelectors) -> Transcript {
    let mut transcript = Transcript::default();
    let mut current: Option<(BlockKind, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(caps) = selectors.label.captures(line) {
            if let Some(label) = label_text(&caps) {
                transcript.label = Some(label);
            }
            continue;
        }

        match selectors.classify(line) {
            Some(kind) => {
                if let Some((kind, body)) = current.take() {
                    push_block(&mut transcript, kind, &body);
                }
                let mut body = Vec::new();
                if kind == BlockKind::Prompt {
                    // Text after the prompt marker is already prompt content
                    if let Some(m) = selectors.prompt.find(line) {
                        let rest = line[m.end()..].trim_start();
                        if !rest.is_empty() {
                            body.push(rest);
                        }
                    }
                }
                current = Some((kind, body));
            }
            None => {
                if let Some((_, body)) = current.as_mut() {
                    body.push(line);
                }
            }
        }
    }

    if let Some((kind, body)) = current {
        push_block(&mut transcript, kind, &body);
    }
    transcript
}

fn push_block(transcript: &mut Transcript, kind: BlockKind, body: &[&str]) {
    transcript.layout.push(kind);
    match kind {
        BlockKind::Response => transcript.responses.push(body.join("\n")),
        BlockKind::Prompt => transcript.prompt = Some(body.join("\n")),
        BlockKind::Other => {}
    }
}

fn label_text(caps: &Captures<'_>) -> Option<String> {
    caps.name("label")
        .or_else(|| caps.get(1))
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

fn read_transcript(path: &Path, selectors: &TranscriptSelectors) -> Result<Transcript, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_transcript(&text, selectors))
}

/// Which notifications a watcher forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchKind {
    Structure,
    PromptEdits,
}

/// Transcript file acting as the live host document
#[derive(Debug, Clone)]
pub struct TranscriptSource {
    path: PathBuf,
    selectors: Arc<TranscriptSelectors>,
    /// Set while the file cannot be read; failures are warned about once
    unreadable: Arc<AtomicBool>,
}

impl TranscriptSource {
    pub fn new(path: impl Into<PathBuf>, settings: &MonitorSettings) -> Result<Self, SourceError> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(SourceError::Read {
                path: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "transcript path has no file name",
                ),
            });
        }
        Ok(Self {
            path,
            selectors: Arc::new(TranscriptSelectors::from_settings(settings)?),
            unreadable: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the transcript as it is right now
    pub fn read(&self) -> Result<Transcript, SourceError> {
        read_transcript(&self.path, &self.selectors)
    }

    fn read_logged(&self) -> Option<Transcript> {
        match self.read() {
            Ok(transcript) => {
                if self.unreadable.swap(false, Ordering::Relaxed) {
                    info!("{} is readable again", self.path.display());
                }
                Some(transcript)
            }
            Err(e) => {
                if self.unreadable.swap(true, Ordering::Relaxed) {
                    debug!("{}", e);
                } else {
                    warn!("{}", e);
                }
                None
            }
        }
    }

    /// Whether the last read failed
    pub fn is_unreadable(&self) -> bool {
        self.unreadable.load(Ordering::Relaxed)
    }

    fn watch(&self, events: EventSender, kind: WatchKind) -> Result<Subscription, SourceError> {
        let watch_error = |source| SourceError::Watch {
            path: self.path.display().to_string(),
            source,
        };

        let file_name: OsString = self.path.file_name().unwrap_or_default().to_os_string();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let path = self.path.clone();
        let selectors = self.selectors.clone();
        let mut previous = read_transcript(&path, &selectors).ok();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            if !event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                return;
            }

            let current = read_transcript(&path, &selectors).ok();
            let change = classify_change(previous.as_ref(), current.as_ref());
            previous = current;

            match (kind, change) {
                (WatchKind::Structure, TranscriptChange::Structural) => {
                    events.structural(None);
                }
                (WatchKind::PromptEdits, TranscriptChange::PromptEdited) => {
                    events.prompt_edited();
                }
                _ => {}
            }
        })
        .map_err(watch_error)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;
        debug!("Watching {} ({:?})", self.path.display(), kind);

        Ok(Subscription::new(move || drop(watcher)))
    }
}

impl TextSource for TranscriptSource {
    fn prompt_input(&self) -> Option<String> {
        self.read_logged()?.prompt
    }

    fn responses(&self) -> Option<Vec<String>> {
        self.read_logged().map(|t| t.responses)
    }

    fn model_label(&self) -> Option<String> {
        self.read_logged()?.label
    }

    fn observe_structure(&self, events: EventSender) -> Option<Subscription> {
        match self.watch(events, WatchKind::Structure) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn observe_prompt(&self, events: EventSender) -> Option<Subscription> {
        if self.read_logged()?.prompt.is_none() {
            warn!(
                "No prompt input in {}; prompt edits are not observed",
                self.path.display()
            );
            return None;
        }
        match self.watch(events, WatchKind::PromptEdits) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}
