use std::time::Duration;

use tokbar_core::source::MemoryDocument;

/// Paragraph streamed repeatedly as the assistant reply (60 words)
const REPLY_CHUNK: &str = "The monitor counts every word in the prompt box and in each \
rendered reply, converts the count to an estimated token total, and keeps the bar in sync \
as new text streams in. Long answers fill the budget quickly, so the color moves from green \
to yellow and then to red before the long reply finally ends on the screen. ";

/// Number of reply chunks streamed
const REPLY_CHUNKS: u32 = 100;

/// Interval between reply chunks
const CHUNK_INTERVAL: Duration = Duration::from_millis(150);

/// A change applied to the demo document
#[derive(Debug, Clone, PartialEq)]
pub enum DemoStep {
    /// Show a model label
    SetLabel(&'static str),
    /// Replace the prompt text (typing)
    Type(&'static str),
    /// Send the prompt: the input empties and a new reply starts
    Submit,
    /// Append text to the reply being generated
    Stream(&'static str),
}

/// A single event in the demo timeline
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Time offset from scenario start
    pub at: Duration,
    pub step: DemoStep,
}

/// Complete demo scenario
pub struct DemoScenario {
    pub timeline: Vec<TimelineEvent>,
}

impl DemoScenario {
    /// Offset of the last event
    pub fn duration(&self) -> Duration {
        self.timeline.last().map(|e| e.at).unwrap_or_default()
    }
}

/// Build the default demo scenario (~25 seconds).
///
/// A prompt is typed and sent, a long reply streams in until the bar is
/// nearly full, and the model switch at the end shows the limit changing.
pub fn default_scenario() -> DemoScenario {
    let mut timeline = vec![
        TimelineEvent {
            at: Duration::ZERO,
            step: DemoStep::SetLabel("GPT-4o"),
        },
        TimelineEvent {
            at: Duration::from_millis(500),
            step: DemoStep::Type("Explain how"),
        },
        TimelineEvent {
            at: Duration::from_millis(1000),
            step: DemoStep::Type("Explain how the usage"),
        },
        TimelineEvent {
            at: Duration::from_millis(1500),
            step: DemoStep::Type("Explain how the usage bar works, in detail please"),
        },
        TimelineEvent {
            at: Duration::from_secs(2),
            step: DemoStep::Submit,
        },
    ];

    let stream_start = Duration::from_millis(2500);
    timeline.extend((0..REPLY_CHUNKS).map(|i| TimelineEvent {
        at: stream_start + CHUNK_INTERVAL * i,
        step: DemoStep::Stream(REPLY_CHUNK),
    }));

    // Switching to a larger model drops the percentage
    let switch_at = stream_start + CHUNK_INTERVAL * REPLY_CHUNKS + Duration::from_secs(2);
    timeline.push(TimelineEvent {
        at: switch_at,
        step: DemoStep::SetLabel("o1-mini"),
    });
    timeline.push(TimelineEvent {
        at: switch_at + Duration::from_secs(3),
        step: DemoStep::Type(""),
    });

    DemoScenario { timeline }
}

/// Apply one step to the document
pub fn apply(document: &MemoryDocument, step: &DemoStep) {
    match step {
        DemoStep::SetLabel(label) => document.set_label(Some(*label)),
        DemoStep::Type(text) => document.set_prompt(text),
        DemoStep::Submit => {
            document.set_prompt("");
            document.push_response("");
        }
        DemoStep::Stream(text) => document.append_response(text),
    }
}

/// Play the timeline against `document` in real time
pub async fn play(document: MemoryDocument, scenario: DemoScenario) {
    let start = tokio::time::Instant::now();
    for event in &scenario.timeline {
        tokio::time::sleep_until(start + event.at).await;
        tracing::debug!("Demo step at {:?}: {:?}", event.at, event.step);
        apply(&document, &event.step);
    }
}
