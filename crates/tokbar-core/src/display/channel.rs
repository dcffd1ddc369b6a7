//! Display adapter that publishes views over a watch channel.
//!
//! The UI loop holds the receiver and redraws from the latest value;
//! `None` means the indicator surface was removed.

use tokio::sync::watch;

use super::{DisplayAdapter, DisplayError, IndicatorView, SurfaceStatus};

/// Receiver for indicator updates
pub type IndicatorReceiver = watch::Receiver<Option<IndicatorView>>;

/// Create a channel display and the receiver the UI reads from
pub fn display_channel() -> (ChannelDisplay, IndicatorReceiver) {
    let (tx, rx) = watch::channel(None);
    (
        ChannelDisplay {
            tx,
            surface: None,
        },
        rx,
    )
}

/// Watch-channel backed display adapter
#[derive(Debug)]
pub struct ChannelDisplay {
    tx: watch::Sender<Option<IndicatorView>>,
    /// Id of the surface, once created
    surface: Option<String>,
}

impl DisplayAdapter for ChannelDisplay {
    fn ensure_surface(&mut self, id: &str) -> Result<SurfaceStatus, DisplayError> {
        if self.surface.as_deref() == Some(id) {
            return Ok(SurfaceStatus::Existing);
        }
        if self.tx.is_closed() {
            return Err(DisplayError::Closed);
        }
        self.surface = Some(id.to_string());
        Ok(SurfaceStatus::Created)
    }

    fn update(&mut self, id: &str, view: &IndicatorView) -> Result<(), DisplayError> {
        if self.surface.as_deref() != Some(id) {
            return Err(DisplayError::MissingSurface { id: id.to_string() });
        }
        // Skip no-op sends so receivers only wake on visible changes
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(view) {
                false
            } else {
                *current = Some(view.clone());
                true
            }
        });
        if !changed && self.tx.is_closed() {
            return Err(DisplayError::Closed);
        }
        Ok(())
    }

    fn remove_surface(&mut self, id: &str) {
        if self.surface.as_deref() == Some(id) {
            self.surface = None;
            self.tx.send_replace(None);
        }
    }
}
