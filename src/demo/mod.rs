//! Demo mode: a scripted conversation driving the monitor.
//!
//! No transcript file is needed. The scenario edits an in-memory document
//! while the usual views watch it.

pub mod scenario;

use std::time::Duration;

use anyhow::Result;
use tokbar_core::source::MemoryDocument;

use crate::config::Settings;
use crate::plain;
use crate::ui::App;

/// Time given to the monitor to settle after the last step
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Run the default scenario in the plain or full-screen view
pub async fn run(settings: Settings, plain: bool) -> Result<()> {
    let document = MemoryDocument::new();
    let scenario = scenario::default_scenario();
    tracing::info!("Starting demo ({:?})", scenario.duration());

    let player = scenario::play(document.clone(), scenario);
    let finished = async {
        tokio::select! {
            _ = player => tokio::time::sleep(SETTLE_DELAY).await,
            _ = tokio::signal::ctrl_c() => {}
        }
    };

    if plain {
        plain::run(&settings, document, finished).await
    } else {
        App::new(settings, "demo".to_string())
            .run_until(document, finished)
            .await
    }
}
