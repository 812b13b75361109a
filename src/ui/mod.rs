//! Terminal user interface components.
//!
//! A transport bar on top, the soundscape's layers and events below it, and
//! a single line of key hints at the bottom.

mod layers;
mod transport;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub use layers::{render_events, render_layers};
pub use transport::render_transport;

/// Key hints shown in the footer.
const KEY_HINTS: &[(&str, &str)] = &[
    ("Space", "Play / Stop"),
    ("←/→", "Intensity"),
    ("q", "Quit"),
];

/// Renders the complete UI.
pub fn render(frame: &mut Frame, app: &App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(5),    // Soundscape
            Constraint::Length(1), // Key hints
        ])
        .split(frame.area());

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(main_chunks[1]);

    render_transport(frame, main_chunks[0], app);
    render_layers(frame, content_chunks[0], app);
    render_events(frame, content_chunks[1], app);
    render_key_hints(frame, main_chunks[2]);
}

fn render_key_hints(frame: &mut Frame, area: Rect) {
    let mut spans: Vec<Span> = Vec::with_capacity(KEY_HINTS.len() * 2);
    for (key, description) in KEY_HINTS {
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {}  ", description),
            Style::default().fg(Color::Gray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
