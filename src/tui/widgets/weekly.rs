use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use super::{status_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let mut items: Vec<ListItem> = Vec::new();

    for bucket in &app.weeks {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} ({})", bucket.label, bucket.topics.len()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))));

        for ranked in &bucket.topics {
            let topic = &ranked.aggregate;
            let action = ranked
                .next_action()
                .map(|kind| kind.label())
                .unwrap_or("Quiz");
            let due = ranked
                .schedule
                .due_at()
                .map(|d| d.format("%a %b %d").to_string())
                .unwrap_or_else(|| "now".to_string());

            items.push(ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    format!("{:<30}", truncate(&topic.topic_name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<10}", topic.status.label()),
                    Style::default().fg(status_color(topic.status)),
                ),
                Span::styled(
                    format!("{:>4.0}%  ", topic.accuracy_percent),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(format!("{:<7}", action), Style::default().fg(Color::Cyan)),
                Span::styled(due, Style::default().fg(Color::DarkGray)),
            ])));
        }
    }

    if items.is_empty() {
        items.push(ListItem::new(Span::styled(
            "Nothing scheduled yet. Record a quiz to get started.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Upcoming Weeks ")
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}
