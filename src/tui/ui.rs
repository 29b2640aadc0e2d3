use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, topic_detail, topics, weekly};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Dashboard", "Topics", "Weekly"];
    let selected = match app.view {
        View::Dashboard => 0,
        View::Topics | View::TopicDetail => 1,
        View::Weekly => 2,
    };

    let title = format!(" Revhub: {} ", app.learner());
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(title))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Topics => topics::draw(f, app, area),
        View::TopicDetail => topic_detail::draw(f, app, area),
        View::Weekly => weekly::draw(f, app, area),
    }
}

fn key(k: &str) -> Span<'_> {
    Span::styled(k, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = if app.filter_mode {
        vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(&app.filter_input),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::raw(" | "),
            key("<CR>"),
            Span::raw(" Apply  "),
            key("<Esc>"),
            Span::raw(" Cancel"),
        ]
    } else {
        let mut spans = vec![key("h/l"), Span::raw(" Views  ")];

        match app.view {
            View::Dashboard => {
                spans.extend(vec![
                    key("s"),
                    Span::raw(" Quiz session  "),
                    key("n"),
                    Span::raw(" Notes session  "),
                    key("^r"),
                    Span::raw(" Refresh  "),
                ]);
            }
            View::Topics => {
                spans.extend(vec![
                    key("j/k"),
                    Span::raw(" Nav  "),
                    key("g/G"),
                    Span::raw(" Top/Bot  "),
                    key("l/<CR>"),
                    Span::raw(" Open  "),
                    key("/"),
                    Span::raw(" Filter  "),
                ]);
                if app.filter.is_some() {
                    spans.extend(vec![key("<Esc>"), Span::raw(" Clear  ")]);
                }
            }
            View::TopicDetail => {
                spans.extend(vec![
                    key("h/<Esc>"),
                    Span::raw(" Back  "),
                    key("^r"),
                    Span::raw(" Refresh  "),
                ]);
            }
            View::Weekly => {
                spans.extend(vec![key("^r"), Span::raw(" Refresh  ")]);
            }
        }

        spans.extend(vec![key("q"), Span::raw(" Quit")]);

        if let Some(message) = &app.message {
            spans.extend(vec![
                Span::raw("  | "),
                Span::styled(message.as_str(), Style::default().fg(Color::Yellow)),
            ]);
        }

        spans
    };

    let help = Paragraph::new(Line::from(help_text)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
