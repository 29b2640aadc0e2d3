use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::{status_color, truncate};
use crate::engine::RankedTopic;
use crate::models::AttemptKind;
use crate::tui::App;

const HISTORY_ROWS: usize = 15;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(ranked) = &app.selected_topic else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Topic Detail ");
        let paragraph = Paragraph::new("No topic selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header info
            Constraint::Length(6), // Mastery + schedule
            Constraint::Min(0),    // Attempts
        ])
        .split(area);

    draw_header(f, ranked, chunks[0]);
    draw_progress(f, ranked, chunks[1]);
    draw_attempts(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, ranked: &RankedTopic, area: Rect) {
    let topic = &ranked.aggregate;
    let scope = if topic.is_chapter_level() {
        "Whole chapter"
    } else {
        "Sub-topic"
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Chapter: ", Style::default().fg(Color::Gray)),
            Span::styled(&topic.display_title, Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled(format!("({})", scope), Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(vec![
            Span::styled("Subject: ", Style::default().fg(Color::Gray)),
            Span::styled(&topic.subject_name, Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled("Owner: ", Style::default().fg(Color::Gray)),
            Span::styled(&topic.topic_owner_id, Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", topic.topic_name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_progress(f: &mut Frame, ranked: &RankedTopic, area: Rect) {
    let topic = &ranked.aggregate;
    let schedule = &ranked.schedule;

    let text = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(
                topic.status.label(),
                Style::default()
                    .fg(status_color(topic.status))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("Accuracy: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{:.0}% ({}/{})",
                    topic.accuracy_percent, topic.total_correct, topic.total_attempted
                ),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Latest: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.0}%", topic.latest_percent),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Quizzes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", topic.quiz_count),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Mastery streak: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", topic.mastery_streak),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled("Priority: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}", ranked.score),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(vec![
            Span::styled("Next notes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_due(schedule.next_note_review_due),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Next quiz: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_due(schedule.next_quiz_due),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Mastery ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_attempts(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .selected_topic_history
        .iter()
        .take(HISTORY_ROWS)
        .map(|record| {
            let (kind_color, score) = match record.kind {
                AttemptKind::Quiz => (
                    Color::Cyan,
                    format!(
                        "{}/{} ({:.0}%)",
                        record.correct_count,
                        record.total_questions,
                        record.percent()
                    ),
                ),
                AttemptKind::NoteReview => (Color::Magenta, "read".to_string()),
            };

            let parts = record
                .topic_breakdown
                .iter()
                .map(|entry| entry.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<14}", record.timestamp.format("%b %d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<7}", record.kind.label()),
                    Style::default().fg(kind_color),
                ),
                Span::styled(format!("{:<14}", score), Style::default().fg(Color::White)),
                Span::styled(truncate(&parts, 40), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let title = if app.selected_topic_history.is_empty() {
        " Attempts (none) ".to_string()
    } else {
        format!(" Attempts ({}) ", app.selected_topic_history.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("No attempts recorded for this chapter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}

fn format_due(due: Option<DateTime<Utc>>) -> String {
    match due {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => "Now".to_string(),
    }
}
