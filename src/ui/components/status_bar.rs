use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Status bar widget
pub struct StatusBar;

impl StatusBar {
    /// Render key hints and the optional status message
    pub fn render(frame: &mut Frame, area: Rect, message: Option<&str>) {
        let mut spans = vec![];
        for (key, action) in [("r", "Refresh "), ("q", "Quit ")] {
            spans.push(Span::styled(
                key,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(":{}", action),
                Style::default().fg(Color::DarkGray),
            ));
        }

        if let Some(msg) = message {
            spans.push(Span::styled(
                format!(" {}", msg),
                Style::default().fg(Color::White),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
