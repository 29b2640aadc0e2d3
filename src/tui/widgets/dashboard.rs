use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{status_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(11), // Stats + due row
            Constraint::Min(0),     // Plan + today
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    draw_stats(f, app, top_chunks[0]);
    draw_due(f, app, top_chunks[1]);
    draw_plan(f, app, bottom_chunks[0]);
    draw_today(f, app, bottom_chunks[1]);
}

fn stat_line(label: &str, value: usize, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(format!("{}", value), Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;

    let text = vec![
        Line::from(vec![
            Span::styled("Topics: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.tracked_topics),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line("Quizzes", stats.quiz_attempts, Color::White),
        stat_line("Note reviews", stats.note_reviews, Color::White),
        stat_line("Weak", stats.weak, Color::Red),
        stat_line("Average", stats.average, Color::Yellow),
        stat_line("Strong", stats.strong, Color::Green),
        stat_line("Excellent", stats.excellent, Color::Cyan),
        stat_line(
            "Due",
            stats.due_now,
            if stats.due_now > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due
        .iter()
        .enumerate()
        .map(|(i, ranked)| {
            let topic = &ranked.aggregate;
            let action = ranked
                .next_action()
                .map(|kind| kind.label())
                .unwrap_or("Quiz");

            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<24}", truncate(&topic.topic_name, 22)),
                    Style::default().fg(status_color(topic.status)),
                ),
                Span::styled(format!("{:<7}", action), Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{:.1}d late", ranked.days_overdue),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let title = format!(" Due Now ({}) ", app.stats.due_now);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Yellow));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_plan(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = if app.plan.is_empty() {
        vec![ListItem::new(Span::styled(
            "No weak topics. Nice work.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.plan
            .iter()
            .map(|step| {
                ListItem::new(vec![
                    Line::from(vec![
                        Span::styled(
                            truncate(&step.topic_name, 30),
                            Style::default().fg(Color::Red),
                        ),
                        Span::styled(
                            format!("  {:.0}%", step.accuracy_percent),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]),
                    Line::from(Span::styled(
                        format!("  {}", step.suggestion),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Study Plan ")
        .title_style(Style::default().fg(Color::Red));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_today(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .today
        .iter()
        .map(|done| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<7}", done.reviewed_at.format("%H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    truncate(&done.topic_name, 28),
                    Style::default().fg(Color::Green),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Notes Reviewed Today ")
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}
