//! Transport bar rendering.
//!
//! Shows the play state, the intensity slider and the status line.

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

/// Renders the transport bar at the top of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let title = format!(" {} ", app.soundscape().name);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // Play state
            Constraint::Length(30), // Intensity
            Constraint::Length(18), // Voices
            Constraint::Min(20),    // Status
        ])
        .split(inner);

    let play_status = if app.is_running() {
        Span::styled(
            " [>] PLAY ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            " [.] STOP ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    };
    frame.render_widget(Paragraph::new(Line::from(play_status)), chunks[0]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Yellow).bg(Color::Black))
        .ratio(f64::from(app.intensity).clamp(0.0, 1.0))
        .label(format!("Intensity {:.0}%", app.intensity * 100.0));
    frame.render_widget(gauge, chunks[1]);

    let engine = app.engine();
    let voices = Paragraph::new(Line::from(vec![
        Span::styled(" Voices: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{}", engine.active_voices()),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(voices, chunks[2]);

    let status_line = if let Some(error) = &app.last_error {
        Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    } else if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        Line::from(Span::styled(
            format!("-- {} --", engine.kind()),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ))
    };
    frame.render_widget(Paragraph::new(status_line), chunks[3]);
}
