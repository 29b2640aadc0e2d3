use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::{status_color, truncate};
use crate::session::{Phase, ReviewSession, TopicResult};
use crate::tui::review::ReviewScreen;

const OPTION_KEYS: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

pub fn draw(f: &mut Frame, screen: &ReviewScreen, now: DateTime<Utc>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Progress header
            Constraint::Min(0),    // Phase content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_header(f, screen, chunks[0]);

    if let Some(results) = &screen.finished {
        draw_results(f, results, chunks[1]);
    } else {
        let session = &screen.session;
        match session.phase() {
            Phase::PresentingRead { .. } => draw_notes(f, session, now, chunks[1]),
            Phase::PresentingQuestion => draw_question(f, session, chunks[1]),
            Phase::Summarizing => draw_topic_summary(f, session, chunks[1]),
            _ => {
                let paragraph = Paragraph::new("Loading...")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(Block::default().borders(Borders::ALL));
                f.render_widget(paragraph, chunks[1]);
            }
        }
    }

    draw_help_bar(f, screen, chunks[2]);
}

fn draw_header(f: &mut Frame, screen: &ReviewScreen, area: Rect) {
    let session = &screen.session;
    let state = session.state();
    let total = state.queue.len();
    let position = (state.cursor + 1).min(total);

    let topic = session
        .current_item()
        .map(|item| format!("{} / {}", item.display_title, item.topic_name))
        .unwrap_or_default();

    let line = Line::from(vec![
        Span::styled(
            format!("{} ", session.mode().label()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("[{}/{}] ", position, total),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(truncate(&topic, 60), Style::default().fg(Color::White)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Review: {} ", screen.learner));

    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_notes(f: &mut Frame, session: &ReviewSession, now: DateTime<Utc>, area: Rect) {
    let mut text: Vec<Line> = Vec::new();
    for chunk in session.notes() {
        text.push(Line::from(Span::styled(
            chunk.topic.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        for paragraph in chunk.content.lines() {
            text.push(Line::from(paragraph.to_string()));
        }
        text.push(Line::from(""));
    }

    let title = match session.read_remaining(now) {
        Some(remaining) if remaining.num_milliseconds() > 0 => {
            let secs = (remaining.num_milliseconds() + 999) / 1000;
            format!(" Notes (quiz unlocks in {}s) ", secs)
        }
        _ => " Notes (press Enter to start the quiz) ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn draw_question(f: &mut Frame, session: &ReviewSession, area: Rect) {
    let Some(question) = session.current_question() else {
        return;
    };
    let state = session.state();
    let answer = session.current_answer();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Prompt
            Constraint::Min(0),    // Options
            Constraint::Length(4), // Explanation
        ])
        .split(area);

    let prompt_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            " Question {}/{} ",
            state.question_index + 1,
            state.loaded_questions.len()
        ))
        .title_style(Style::default().fg(Color::Cyan));
    let prompt = Paragraph::new(question.prompt.as_str())
        .block(prompt_block)
        .wrap(Wrap { trim: true });
    f.render_widget(prompt, chunks[0]);

    let items: Vec<ListItem> = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let key = OPTION_KEYS.get(i).copied().unwrap_or('?');
            let style = match answer {
                Some(_) if i == question.correct_option => Style::default().fg(Color::Green),
                Some(chosen) if i == chosen => Style::default().fg(Color::Red),
                Some(_) => Style::default().fg(Color::DarkGray),
                None => Style::default().fg(Color::White),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}) ", key), Style::default().fg(Color::Cyan)),
                Span::styled(option.as_str(), style),
            ]))
        })
        .collect();

    let options = List::new(items).block(Block::default().borders(Borders::ALL).title(" Options "));
    f.render_widget(options, chunks[1]);

    let feedback = match answer {
        Some(chosen) if chosen == question.correct_option => Line::from(Span::styled(
            "Correct!",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Some(_) => Line::from(vec![
            Span::styled(
                "Not quite. ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(question.explanation.as_deref().unwrap_or("")),
        ]),
        None => Line::from(""),
    };
    let explanation = Paragraph::new(feedback)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(explanation, chunks[2]);
}

fn draw_topic_summary(f: &mut Frame, session: &ReviewSession, area: Rect) {
    let Some(result) = session.last_result() else {
        return;
    };

    let text = vec![
        Line::from(Span::styled(
            result.topic_name.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Score: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{} ({:.0}%)", result.correct, result.total, result.percent),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(
                result.status.label(),
                Style::default().fg(status_color(result.status)),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Topic Complete ")
        .title_style(Style::default().fg(Color::Green));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_results(f: &mut Frame, results: &[TopicResult], area: Rect) {
    let items: Vec<ListItem> = if results.is_empty() {
        vec![ListItem::new(Span::styled(
            "Nothing was reviewed this time.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        results
            .iter()
            .map(|result| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<32}", truncate(&result.topic_name, 30)),
                        Style::default().fg(Color::White),
                    ),
                    Span::styled(
                        format!("{:>3}/{:<3} ", result.correct, result.total),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled(
                        format!("{:>4.0}%  ", result.percent),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::styled(
                        result.status.label(),
                        Style::default().fg(status_color(result.status)),
                    ),
                ]))
            })
            .collect()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Session Complete ({} topics) ", results.len()))
        .title_style(Style::default().fg(Color::Green));

    f.render_widget(List::new(items).block(block), area);
}

fn draw_help_bar(f: &mut Frame, screen: &ReviewScreen, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));

    let mut spans = if screen.finished.is_some() {
        vec![key("any key"), Span::raw(" Close")]
    } else {
        match screen.session.phase() {
            Phase::PresentingRead { .. } => vec![
                key("<CR>"),
                Span::raw(" Start quiz  "),
                key("q"),
                Span::raw(" Exit"),
            ],
            Phase::PresentingQuestion => vec![
                key("a-d/1-4"),
                Span::raw(" Answer  "),
                key("q"),
                Span::raw(" Exit"),
            ],
            _ => vec![key("q"), Span::raw(" Exit")],
        }
    };

    if let Some(message) = &screen.message {
        spans.extend(vec![
            Span::raw("  | "),
            Span::styled(message.as_str(), Style::default().fg(Color::Yellow)),
        ]);
    }

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}
