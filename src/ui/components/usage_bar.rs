//! Token usage bar: the full-screen counterpart of the indicator.

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use tokbar_core::usage::UsageBand;
use tokbar_core::IndicatorView;

/// Everything the bar needs besides the view itself
pub struct UsageBarProps<'a> {
    pub title: &'a str,
    pub updated_at: Option<DateTime<Local>>,
    pub color: bool,
    pub show_breakdown: bool,
}

/// Usage bar widget
pub struct UsageBar;

impl UsageBar {
    /// Rows needed including the border
    pub fn height(show_breakdown: bool) -> u16 {
        // bar + label, plus the optional breakdown row
        if show_breakdown {
            5
        } else {
            4
        }
    }

    /// Render the usage bar
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        view: Option<&IndicatorView>,
        props: &UsageBarProps<'_>,
    ) {
        if area.height < 3 || area.width < 10 {
            return;
        }

        let block = Block::default()
            .title(Self::build_title(props))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Gray));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(view) = view else {
            let line = Line::from(Span::styled(
                " Waiting for first update...",
                Style::default().fg(Color::DarkGray),
            ));
            frame.render_widget(Paragraph::new(vec![line]), inner);
            return;
        };

        let mut lines = vec![
            Self::bar_line(view, inner.width, props.color),
            Line::from(Span::styled(
                format!(" {}", view.label),
                Style::default().fg(Color::White),
            )),
        ];
        if props.show_breakdown {
            lines.push(Line::from(Span::styled(
                format!(
                    " Prompt {} | Responses {}",
                    view.prompt_tokens, view.response_tokens
                ),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::DIM),
            )));
        }
        lines.truncate(inner.height as usize);

        frame.render_widget(Paragraph::new(lines), inner);
    }

    /// Block title with the source name and last update time
    fn build_title(props: &UsageBarProps<'_>) -> String {
        match props.updated_at {
            Some(at) => format!(" {} ({}) ", props.title, at.format("%H:%M:%S")),
            None => format!(" {} ", props.title),
        }
    }

    /// " ████████░░░░░░  42.0%"
    fn bar_line(view: &IndicatorView, width: u16, color: bool) -> Line<'static> {
        let (filled, empty) = Self::split_width(view.fill_percent, width);
        let fill_style = if color {
            Style::default().fg(Self::band_color(view.band))
        } else {
            Style::default().fg(Color::Gray)
        };
        let dim = Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM);

        Line::from(vec![
            Span::raw(" "),
            Span::styled("█".repeat(filled), fill_style),
            Span::styled("░".repeat(empty), dim),
            Span::styled(
                format!(" {:>5.1}%", view.fill_percent),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ])
    }

    /// Split the inner width into filled and empty cells
    fn split_width(fill_percent: f64, width: u16) -> (usize, usize) {
        // " " + bar + " 100.0%"
        let fixed_width = 1 + 7;
        let bar_width = (width as usize).saturating_sub(fixed_width).max(4);
        let filled = ((bar_width as f64 * fill_percent / 100.0).round() as usize).min(bar_width);
        (filled, bar_width - filled)
    }

    fn band_color(band: UsageBand) -> Color {
        match band {
            UsageBand::Low => Color::Green,
            UsageBand::Mid => Color::Yellow,
            UsageBand::High => Color::Red,
        }
    }
}
