use std::time::Duration;

use chrono::Utc;
use crossterm::event::{self, Event as TermEvent, KeyCode};

use super::{widgets, Tty};
use crate::config::AppConfig;
use crate::content::{DirectoryStore, TieredResolver};
use crate::db::Database;
use crate::engine;
use crate::session::{
    build_queue, Collaborators, Event, Response, ReviewSession, SessionMode, TopicResult,
};

pub struct ReviewScreen<'a> {
    pub session: ReviewSession<'a>,
    pub learner: String,
    pub message: Option<String>,
    pub finished: Option<Vec<TopicResult>>,
}

fn map_key(code: KeyCode) -> Option<Event> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Event::Exit),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Event::BeginQuiz),
        KeyCode::Char(c @ '1'..='9') => Some(Event::Select(c as usize - '1' as usize)),
        KeyCode::Char(c @ 'a'..='f') => Some(Event::Select(c as usize - 'a' as usize)),
        _ => None,
    }
}

pub fn run_loop(
    terminal: &mut Tty,
    db: &Database,
    config: &AppConfig,
    learner: &str,
    mode: SessionMode,
    force: bool,
    seed: u64,
) -> Result<Vec<TopicResult>, Box<dyn std::error::Error>> {
    let token = db.acquire_session(learner, force)?;

    let now = Utc::now();
    let history = db.list_attempts(learner)?;
    let ranked = engine::scheduling_pass(&history, config, now);
    let queue = build_queue(&ranked, mode, now, config.schedule.session.queue_limit);
    log::info!(
        "starting {} session for {} with {} topics",
        mode.as_str(),
        learner,
        queue.len()
    );

    let resolver = TieredResolver::new(db, DirectoryStore::new(config.content_dir.clone()));
    let deps = Collaborators {
        history: db,
        content: &resolver,
        demand: db,
    };
    let session = ReviewSession::new(deps, token, queue, mode, config, seed);
    let mut screen = ReviewScreen {
        session,
        learner: learner.to_string(),
        message: None,
        finished: None,
    };

    if let Response::Finished(results) = screen.session.start(Utc::now())? {
        screen.finished = Some(results);
    }

    loop {
        let now = Utc::now();
        terminal.draw(|f| widgets::session::draw(f, &screen, now))?;

        let mut pressed = None;
        if event::poll(Duration::from_millis(100))? {
            if let TermEvent::Key(key) = event::read()? {
                pressed = Some(key.code);
            }
        }

        // Any key leaves the final summary.
        if let Some(results) = screen.finished.take() {
            if pressed.is_some() {
                return Ok(results);
            }
            screen.finished = Some(results);
            continue;
        }

        let event = pressed.and_then(map_key).unwrap_or(Event::Tick);
        let response = screen.session.handle(event, Utc::now())?;
        match response {
            Response::Wait { remaining } => {
                screen.message = Some(format!(
                    "Keep reading: quiz unlocks in {}s",
                    remaining.num_seconds().max(1)
                ));
            }
            Response::Finished(results) => screen.finished = Some(results),
            Response::Continue => {
                if event != Event::Tick {
                    screen.message = None;
                }
            }
            Response::Ignored => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod key_map_tests {
        use super::*;

        #[test]
        fn digits_and_letters_select_options() {
            assert_eq!(map_key(KeyCode::Char('1')), Some(Event::Select(0)));
            assert_eq!(map_key(KeyCode::Char('4')), Some(Event::Select(3)));
            assert_eq!(map_key(KeyCode::Char('a')), Some(Event::Select(0)));
            assert_eq!(map_key(KeyCode::Char('c')), Some(Event::Select(2)));
        }

        #[test]
        fn control_keys() {
            assert_eq!(map_key(KeyCode::Enter), Some(Event::BeginQuiz));
            assert_eq!(map_key(KeyCode::Char(' ')), Some(Event::BeginQuiz));
            assert_eq!(map_key(KeyCode::Esc), Some(Event::Exit));
            assert_eq!(map_key(KeyCode::Char('q')), Some(Event::Exit));
            assert_eq!(map_key(KeyCode::Char('z')), None);
        }
    }
}
