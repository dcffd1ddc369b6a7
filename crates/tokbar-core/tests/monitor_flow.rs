use std::path::Path;
use std::time::Duration;

use tokbar_core::display::{display_channel, IndicatorReceiver};
use tokbar_core::source::{DocumentDisplay, MemoryDocument, TranscriptSource};
use tokbar_core::{Monitor, MonitorSettings, RefreshScheduler, UsageBand, INDICATOR_ID};

fn write_atomic(path: &Path, content: &str) {
    let tmp = path.with_file_name(".chat.tmp");
    std::fs::write(&tmp, content).unwrap();
    std::fs::rename(&tmp, path).unwrap();
}

async fn next_label(rx: &mut IndicatorReceiver) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .ok()?
        .ok()?;
    rx.borrow_and_update().as_ref().map(|v| v.label.clone())
}

#[tokio::test]
async fn transcript_changes_drive_the_indicator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.md");
    std::fs::write(&path, "model: gpt-4o\n### assistant\none two three\n>>> hi\n").unwrap();

    let settings = MonitorSettings::default();
    let source = TranscriptSource::new(&path, &settings).unwrap();
    let (display, mut rx) = display_channel();
    let monitor = Monitor::new(&settings, Box::new(source), Box::new(display));
    let handle = RefreshScheduler::new(monitor, &settings).start();

    // 3 response words -> 4 tokens, 1 prompt word -> 1 token
    assert_eq!(
        next_label(&mut rx).await.as_deref(),
        Some("5 / 8192 tokens | Remaining: 8187")
    );

    // Switching model applies the new limit in the same cycle
    write_atomic(
        &path,
        "model: o1-mini\n### assistant\none two three\n>>> hi\n",
    );
    assert_eq!(
        next_label(&mut rx).await.as_deref(),
        Some("5 / 64000 tokens | Remaining: 63995")
    );

    // Editing the prompt refreshes too
    write_atomic(
        &path,
        "model: o1-mini\n### assistant\none two three\n>>> hi there you\n",
    );
    assert_eq!(
        next_label(&mut rx).await.as_deref(),
        Some("8 / 64000 tokens | Remaining: 63992")
    );

    let monitor = handle.stop().await.unwrap();
    assert!(monitor.state().is_torn_down());
    assert!(rx.borrow().is_none());
}

#[tokio::test]
async fn indicator_insertion_causes_no_extra_cycles() {
    let doc = MemoryDocument::new();
    doc.push_response("Don't over-think it.");
    let settings = MonitorSettings::default();
    let monitor = Monitor::new(
        &settings,
        Box::new(doc.clone()),
        Box::new(DocumentDisplay::new(doc.clone())),
    );
    let handle = RefreshScheduler::new(monitor, &settings).start();

    for _ in 0..100 {
        if doc.has_node(INDICATOR_ID) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Give any self-triggered cycles time to run
    tokio::time::sleep(Duration::from_millis(100)).await;

    let monitor = handle.stop().await.unwrap();
    assert_eq!(monitor.state().cycles(), 1);
    assert_eq!(
        monitor.state().last_snapshot().map(|s| s.used_tokens()),
        Some(4)
    );
}

#[tokio::test]
async fn streaming_response_moves_through_bands() {
    let doc = MemoryDocument::new();
    let settings = MonitorSettings {
        token_limit: 100,
        ..MonitorSettings::default()
    };
    let (display, mut rx) = display_channel();
    let monitor = Monitor::new(&settings, Box::new(doc.clone()), Box::new(display));
    let handle = RefreshScheduler::new(monitor, &settings).start();

    let mut bands = Vec::new();
    for chunk in 0..8 {
        // Each chunk adds 10 words (13 tokens)
        doc.append_response(&format!(" w{} ", chunk).repeat(10));
        loop {
            tokio::time::timeout(Duration::from_secs(5), rx.changed())
                .await
                .expect("no render")
                .unwrap();
            let view = rx.borrow_and_update().clone();
            if let Some(view) = view {
                if view.fill_percent > 0.0 {
                    bands.push(view.band);
                    break;
                }
            }
        }
    }

    handle.stop().await;
    assert_eq!(bands.first(), Some(&UsageBand::Low));
    assert!(bands.contains(&UsageBand::Mid));
    assert_eq!(bands.last(), Some(&UsageBand::High));
}
