use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{status_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now();
    let title = if let Some(filter) = &app.filter {
        format!(" Topics (filter: {}) ", filter)
    } else {
        format!(" Topics ({}) ", app.topics.items.len())
    };

    let items: Vec<ListItem> = app
        .topics
        .items
        .iter()
        .map(|ranked| {
            let topic = &ranked.aggregate;
            let action = ranked
                .next_action()
                .map(|kind| kind.label())
                .unwrap_or("Quiz");

            let (due_color, due_text) = match ranked.schedule.due_at() {
                Some(due) if due <= now => (Color::Red, format!("{} !", format_due(due))),
                Some(due) => (Color::White, format_due(due)),
                None => (Color::Red, "Now !".to_string()),
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&topic.topic_name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<10}", topic.status.label()),
                    Style::default().fg(status_color(topic.status)),
                ),
                Span::styled(
                    accuracy_bar(topic.accuracy_percent),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" {:>3.0}% ", topic.accuracy_percent),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("x{:<3}", topic.mastery_streak),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(format!("{:<7}", action), Style::default().fg(Color::Cyan)),
                Span::styled(due_text, Style::default().fg(due_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<32}", "Topic"), header_style),
        Span::styled(format!("{:<10}", "Status"), header_style),
        Span::styled(format!("{:<16}", "Accuracy"), header_style),
        Span::styled(format!("{:<4}", "Run"), header_style),
        Span::styled(format!("{:<7}", "Next"), header_style),
        Span::styled("Due", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.topics.selected);

    // Header sits on the first row inside the border
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}

fn accuracy_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 10.0).round()) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn format_due(due: DateTime<Utc>) -> String {
    due.format("%b %d").to_string()
}
