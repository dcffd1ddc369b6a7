//! One-shot estimate for a transcript file or stdin.

use std::io::Read;
use std::num::NonZeroU64;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use tokbar_core::source::{parse_transcript, MemoryDocument, Transcript, TranscriptSelectors};
use tokbar_core::{aggregate, IndicatorView, UsageSnapshot};

use crate::config::Settings;

/// Result of a one-shot estimate
#[derive(Debug, Serialize)]
pub struct EstimateReport {
    /// Model label the limit was resolved from
    pub model: Option<String>,
    /// Whether the text was split into transcript blocks
    pub structured: bool,
    #[serde(flatten)]
    pub snapshot: UsageSnapshot,
    pub label: String,
}

/// Estimate usage of `text`.
///
/// Text with recognizable blocks is counted like a live transcript;
/// anything else is counted as a single response. `model` overrides the
/// label found in the text.
pub fn estimate_text(settings: &Settings, text: &str, model: Option<&str>) -> Result<EstimateReport> {
    let selectors = TranscriptSelectors::from_settings(&settings.monitor)?;
    let transcript = parse_transcript(text, &selectors);
    let structured = !transcript.layout.is_empty();

    let document = if structured {
        document_from(&transcript)
    } else {
        let document = MemoryDocument::new();
        document.set_prompt("");
        document.push_response(text);
        document
    };

    let model = model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .or(transcript.label);
    let max_tokens = resolve_limit(settings, model.as_deref());

    let snapshot = aggregate(&document, max_tokens);
    let label = IndicatorView::from_snapshot(&snapshot).label;

    Ok(EstimateReport {
        model,
        structured,
        snapshot,
        label,
    })
}

fn document_from(transcript: &Transcript) -> MemoryDocument {
    let document = MemoryDocument::new();
    // An absent prompt block still counts as an empty input
    document.set_prompt(transcript.prompt.as_deref().unwrap_or(""));
    for response in &transcript.responses {
        document.push_response(response);
    }
    document
}

fn resolve_limit(settings: &Settings, model: Option<&str>) -> NonZeroU64 {
    model
        .and_then(|m| settings.monitor.limit_table().resolve(m))
        .unwrap_or_else(|| settings.monitor.initial_limit())
}

/// Run the `estimate` subcommand
pub fn run(settings: &Settings, file: Option<&Path>, model: Option<&str>, json: bool) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let report = estimate_text(settings, &text, model)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.label);
    if let Some(ref model) = report.model {
        println!("Model: {}", model);
    }
    if settings.ui.show_breakdown {
        println!(
            "Prompt: {} tokens, Responses: {} tokens ({} words in {} segments)",
            report.snapshot.prompt_tokens(),
            report.snapshot.response_tokens(),
            report.snapshot.used_words(),
            report.snapshot.segment_count()
        );
    }
    Ok(())
}
