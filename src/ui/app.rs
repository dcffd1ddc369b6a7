use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use std::future::{pending, Future};
use std::io;
use std::time::Duration;

use tokbar_core::display::{display_channel, IndicatorReceiver};
use tokbar_core::{IndicatorView, Monitor, RefreshScheduler, SchedulerHandle, TextSource};

use crate::config::Settings;

use super::components::{StatusBar, UsageBar, UsageBarProps};

/// How often terminal input is checked
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a key press asks the app to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    Refresh,
    Ignore,
}

/// Full-screen application
pub struct App {
    settings: Settings,
    title: String,
    view: Option<IndicatorView>,
    updated_at: Option<DateTime<Local>>,
    message: Option<String>,
}

impl App {
    /// Create a new application
    pub fn new(settings: Settings, title: String) -> Self {
        Self {
            settings,
            title,
            view: None,
            updated_at: None,
            message: None,
        }
    }

    /// Run until the user quits
    pub async fn run<S: TextSource + 'static>(self, source: S) -> Result<()> {
        self.run_until(source, pending()).await
    }

    /// Run until the user quits or `until` resolves
    pub async fn run_until<S: TextSource + 'static>(
        mut self,
        source: S,
        until: impl Future<Output = ()>,
    ) -> Result<()> {
        let (display, mut view_rx) = display_channel();
        let monitor = Monitor::new(&self.settings.monitor, Box::new(source), Box::new(display));
        let handle = RefreshScheduler::new(monitor, &self.settings.monitor).start();

        // Setup terminal
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Main loop
        let result = self
            .main_loop(&mut terminal, &mut view_rx, &handle, until)
            .await;

        // Restore terminal
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        terminal.show_cursor()?;

        if let Some(monitor) = handle.stop().await {
            tracing::debug!("Stopped after {} cycles", monitor.state().cycles());
        }
        result
    }

    async fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        view_rx: &mut IndicatorReceiver,
        handle: &SchedulerHandle,
        until: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(until);
        let mut dirty = true;

        loop {
            if dirty {
                terminal.draw(|frame| self.draw(frame))?;
                dirty = false;
            }

            // Drain pending input without blocking the runtime
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match key_action(key.code, key.modifiers) {
                            KeyAction::Quit => return Ok(()),
                            KeyAction::Refresh => {
                                if !handle.refresh() {
                                    self.message = Some("Monitor stopped".to_string());
                                }
                            }
                            KeyAction::Ignore => {}
                        }
                    }
                    _ => {}
                }
                dirty = true;
            }

            tokio::select! {
                _ = &mut until => return Ok(()),
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Indicator channel closed");
                        return Ok(());
                    }
                    self.view = view_rx.borrow_and_update().clone();
                    self.updated_at = Some(Local::now());
                    self.message = None;
                    dirty = true;
                }
                _ = tokio::time::sleep(INPUT_POLL_INTERVAL) => {}
            }
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        let ui = &self.settings.ui;
        let [bar_area, _, status_area] = Layout::vertical([
            Constraint::Length(UsageBar::height(ui.show_breakdown)),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let props = UsageBarProps {
            title: &self.title,
            updated_at: self.updated_at,
            color: ui.color,
            show_breakdown: ui.show_breakdown,
        };
        UsageBar::render(frame, bar_area, self.view.as_ref(), &props);
        StatusBar::render(frame, status_area, self.message.as_deref());
    }
}

fn key_action(code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('r') => KeyAction::Refresh,
        _ => KeyAction::Ignore,
    }
}
