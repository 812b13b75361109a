//! Soundscape contents rendering.
//!
//! Lists the base layers on the left and the candidate events, with their
//! share of the total weight and delay range, on the right.

use crate::app::App;
use crate::playback::BASE_LAYER_VOLUME;
use crate::scheduler::intensity_factor;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem};
use ratatui::Frame;

/// Renders the base layer list.
pub fn render_layers(frame: &mut Frame, area: Rect, app: &App) {
    let running = app.is_running();
    let items: Vec<ListItem> = app
        .soundscape()
        .base_layers
        .iter()
        .map(|layer| {
            let indicator = if running {
                Span::styled(
                    "~ ",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled("  ", Style::default().fg(Color::DarkGray))
            };
            ListItem::new(Line::from(vec![
                indicator,
                Span::styled(format!("{:<18}", layer.name), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:>4.0}%", layer.volume_or(BASE_LAYER_VOLUME) * 100.0),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let title = format!(" Layers ({}) ", app.engine().active_base_layers());
    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray)),
    );
    frame.render_widget(list, area);
}

/// Renders the event list with selection odds and the current effective
/// delay range.
pub fn render_events(frame: &mut Frame, area: Rect, app: &App) {
    let soundscape = app.soundscape();
    let total = soundscape.total_weight();
    let factor = intensity_factor(app.intensity);

    let items: Vec<ListItem> = soundscape
        .events
        .iter()
        .map(|event| {
            let share = if total > 0.0 {
                event.weight / total * 100.0
            } else {
                0.0
            };
            let min = event.min_delay as f64 / factor / 1000.0;
            let max = event.max_delay as f64 / factor / 1000.0;
            let share_color = if event.weight > 0.0 {
                Color::Green
            } else {
                Color::DarkGray
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<18}", event.name), Style::default().fg(Color::White)),
                Span::styled(format!("{:>5.1}%", share), Style::default().fg(share_color)),
                Span::styled(
                    format!("  every {:.1}-{:.1}s", min, max),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let title = format!(" Events (fired {}) ", app.engine().events_fired());
    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray)),
    );
    frame.render_widget(list, area);
}
