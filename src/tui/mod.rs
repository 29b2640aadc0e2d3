mod review;
mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::AppConfig;
use crate::db::Database;
use crate::engine::insights::{CompletedTopic, PlanStep, WeekBucket};
use crate::engine::{self, RankedTopic, Stats};
use crate::models::AttemptRecord;
use crate::session::{SessionMode, TopicResult};

type Tty = Terminal<CrosstermBackend<io::Stdout>>;

const DASHBOARD_DUE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Topics,
    TopicDetail,
    Weekly,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Weekly,
            View::TopicDetail => View::Topics,
            View::Weekly => View::Dashboard,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Weekly,
            View::Topics => View::Dashboard,
            View::TopicDetail => View::Topics,
            View::Weekly => View::Topics,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    db: Database,
    config: AppConfig,
    learner: String,
    pub view: View,
    pub topics: StatefulList<RankedTopic>,
    pub due: Vec<RankedTopic>,
    pub weeks: Vec<WeekBucket>,
    pub plan: Vec<PlanStep>,
    pub today: Vec<CompletedTopic>,
    pub stats: Stats,
    pub selected_topic: Option<RankedTopic>,
    pub selected_topic_history: Vec<AttemptRecord>,
    pub filter: Option<String>,
    pub filter_input: String,
    pub filter_mode: bool,
    pub pending_session: Option<SessionMode>,
    pub message: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        db: Database,
        config: AppConfig,
        learner: String,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut app = Self {
            db,
            config,
            learner,
            view: View::Dashboard,
            topics: StatefulList::with_items(Vec::new()),
            due: Vec::new(),
            weeks: Vec::new(),
            plan: Vec::new(),
            today: Vec::new(),
            stats: Stats::default(),
            selected_topic: None,
            selected_topic_history: Vec::new(),
            filter: None,
            filter_input: String::new(),
            filter_mode: false,
            pending_session: None,
            message: None,
            should_quit: false,
        };
        app.refresh_data()?;
        Ok(app)
    }

    pub fn learner(&self) -> &str {
        &self.learner
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let now = Utc::now();
        let history = self.db.list_attempts(&self.learner)?;
        let ranked = engine::scheduling_pass(&history, &self.config, now);

        self.stats = engine::stats(&history, &ranked, now);
        self.today = engine::completed_today(&history, now);
        self.weeks = engine::weekly_breakdown(&ranked, now);
        self.due = engine::due_queue(&ranked, now)
            .into_iter()
            .take(DASHBOARD_DUE)
            .cloned()
            .collect();

        let aggregates: Vec<_> = ranked.iter().map(|r| r.aggregate.clone()).collect();
        self.plan = engine::study_plan(&aggregates);

        let filtered: Vec<RankedTopic> = match &self.filter {
            Some(needle) => {
                let needle = needle.to_lowercase();
                ranked
                    .into_iter()
                    .filter(|r| {
                        r.aggregate.topic_name.to_lowercase().contains(&needle)
                            || r.aggregate.subject_name.to_lowercase().contains(&needle)
                    })
                    .collect()
            }
            None => ranked,
        };
        self.topics = StatefulList::with_items(filtered);
        Ok(())
    }

    fn apply_filter(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.filter_input.is_empty() {
            self.filter = None;
        } else {
            self.filter = Some(self.filter_input.clone());
        }
        self.refresh_data()
    }

    fn select_topic(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(topic) = self.topics.selected_item() {
            let topic = topic.clone();
            let owner = topic.aggregate.topic_owner_id.clone();
            self.selected_topic_history = self
                .db
                .list_attempts(&self.learner)?
                .into_iter()
                .filter(|r| r.topic_owner_id == owner)
                .rev()
                .collect();
            self.selected_topic = Some(topic);
            self.view = View::TopicDetail;
        }
        Ok(())
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Handle filter mode input (vim-like / search)
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter()?;
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            // Start a review session from the dashboard
            KeyCode::Char('s') if self.view == View::Dashboard => {
                self.pending_session = Some(SessionMode::Quiz);
            }
            KeyCode::Char('n') if self.view == View::Dashboard => {
                self.pending_session = Some(SessionMode::NotesThenQuiz);
            }

            KeyCode::Char('/') if self.view == View::Topics => {
                self.filter_mode = true;
                self.filter_input.clear();
            }

            KeyCode::Esc => match self.view {
                View::TopicDetail => {
                    self.view = View::Topics;
                    self.selected_topic = None;
                }
                View::Topics if self.filter.is_some() => {
                    self.filter = None;
                    self.filter_input.clear();
                    self.apply_filter()?;
                }
                _ => {}
            },

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::TopicDetail => {
                    self.view = View::Topics;
                    self.selected_topic = None;
                }
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Topics => self.select_topic()?,
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down => {
                if self.view == View::Topics {
                    self.topics.next();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.view == View::Topics {
                    self.topics.previous();
                }
            }

            KeyCode::Char('g') => {
                if self.view == View::Topics && !self.topics.items.is_empty() {
                    self.topics.selected = Some(0);
                }
            }
            KeyCode::Char('G') => {
                if self.view == View::Topics && !self.topics.items.is_empty() {
                    self.topics.selected = Some(self.topics.items.len() - 1);
                }
            }

            KeyCode::Enter => {
                if self.view == View::Topics {
                    self.select_topic()?;
                }
            }

            _ => {}
        }
        Ok(())
    }
}

fn setup_terminal() -> Result<Tty, Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Tty) -> Result<(), Box<dyn std::error::Error>> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run(
    db: Database,
    config: AppConfig,
    learner: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(db, config, learner)?;

    let mut terminal = setup_terminal()?;
    let result = drive(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    result
}

/// Run a single review session full screen and hand back its results.
pub fn run_review(
    db: &Database,
    config: &AppConfig,
    learner: &str,
    mode: SessionMode,
    force: bool,
    seed: u64,
) -> Result<Vec<TopicResult>, Box<dyn std::error::Error>> {
    let mut terminal = setup_terminal()?;
    let result = review::run_loop(&mut terminal, db, config, learner, mode, force, seed);
    restore_terminal(&mut terminal)?;

    result
}

// Dashboard loop; a requested session takes over the screen until it ends.
fn drive(terminal: &mut Tty, app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        run_app(terminal, app)?;

        let Some(mode) = app.pending_session.take() else {
            return Ok(());
        };

        let seed = rand::random();
        let outcome = review::run_loop(
            terminal,
            &app.db,
            &app.config,
            &app.learner,
            mode,
            false,
            seed,
        );
        app.message = Some(match outcome {
            Ok(results) => format!("Session finished: {} topics reviewed", results.len()),
            Err(e) => format!("Session failed: {}", e),
        });
        app.refresh_data()?;
    }
}

fn run_app(terminal: &mut Tty, app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit || app.pending_session.is_some() {
            return Ok(());
        }
    }
}
