//! Line-oriented output for `--plain` mode.
//!
//! Every visible change of the indicator is printed as one line; repeated
//! identical views are suppressed.

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use crossterm::style::{Color, Stylize};

use tokbar_core::display::{DisplayError, SurfaceStatus};
use tokbar_core::usage::UsageBand;
use tokbar_core::{DisplayAdapter, IndicatorView, Monitor, RefreshScheduler, TextSource};

use crate::config::Settings;

/// Width of the text bar in characters
const BAR_WIDTH: usize = 20;

/// Display adapter that writes one line per change
pub struct LineDisplay<W> {
    out: W,
    color: bool,
    surface: Option<String>,
    last_line: Option<String>,
}

impl<W: Write + Send> LineDisplay<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            surface: None,
            last_line: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a view as "[#####---------------]  25.0% <label>"
pub fn render_line(view: &IndicatorView, color: bool) -> String {
    let filled = ((BAR_WIDTH as f64 * view.fill_percent / 100.0).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let bar = if color {
        bar.with(band_color(view.band)).to_string()
    } else {
        bar
    };
    format!("[{}] {:>5.1}% {}", bar, view.fill_percent, view.label)
}

fn band_color(band: UsageBand) -> Color {
    match band {
        UsageBand::Low => Color::Green,
        UsageBand::Mid => Color::Yellow,
        UsageBand::High => Color::Red,
    }
}

impl<W: Write + Send> DisplayAdapter for LineDisplay<W> {
    fn ensure_surface(&mut self, id: &str) -> Result<SurfaceStatus, DisplayError> {
        if self.surface.as_deref() == Some(id) {
            return Ok(SurfaceStatus::Existing);
        }
        self.surface = Some(id.to_string());
        Ok(SurfaceStatus::Created)
    }

    fn update(&mut self, id: &str, view: &IndicatorView) -> Result<(), DisplayError> {
        if self.surface.as_deref() != Some(id) {
            return Err(DisplayError::MissingSurface { id: id.to_string() });
        }
        let line = render_line(view, self.color);
        if self.last_line.as_deref() == Some(line.as_str()) {
            return Ok(());
        }
        writeln!(self.out, "{}", line)
            .and_then(|_| self.out.flush())
            .map_err(|_| DisplayError::Closed)?;
        self.last_line = Some(line);
        Ok(())
    }

    fn remove_surface(&mut self, id: &str) {
        if self.surface.as_deref() == Some(id) {
            self.surface = None;
            self.last_line = None;
        }
    }
}

/// Monitor `source`, printing to stdout until `until` resolves
pub async fn run<S>(settings: &Settings, source: S, until: impl Future<Output = ()>) -> Result<()>
where
    S: TextSource + 'static,
{
    let display = LineDisplay::new(std::io::stdout(), settings.ui.color);
    let monitor = Monitor::new(&settings.monitor, Box::new(source), Box::new(display));
    let handle = RefreshScheduler::new(monitor, &settings.monitor).start();

    until.await;

    if let Some(monitor) = handle.stop().await {
        tracing::debug!("Stopped after {} cycles", monitor.state().cycles());
    }
    Ok(())
}
