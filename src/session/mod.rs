//! Review session state machine.
//!
//! A session walks a queue of topics. For each one it loads content, skips
//! the topic when there is nothing to ask, otherwise runs an optional
//! read-first phase and then one question at a time, and finally records the
//! attempt. Every delay is an explicit [`Timer`] fired by [`Event::Tick`], so
//! exiting is the same operation no matter where the session is.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::{AppConfig, Profile, SessionSettings, Thresholds};
use crate::content::{ContentRequest, ContentResolver, DemandSink};
use crate::engine::classify::classify;
use crate::engine::{notes_due, quizzes_due, RankedTopic};
use crate::error::Result;
use crate::models::{
    normalize_topic_name, percent_of, AnswerMark, AttemptRecord, BreakdownEntry, MasteryStatus,
    NoteChunk, Question, SessionToken, TopicAggregate, TopicKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    Quiz,
    NotesThenQuiz,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Quiz => "quiz",
            SessionMode::NotesThenQuiz => "notes",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiz" | "q" => Some(SessionMode::Quiz),
            "notes" | "notes-then-quiz" | "read" | "n" => Some(SessionMode::NotesThenQuiz),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionMode::Quiz => "Quiz",
            SessionMode::NotesThenQuiz => "Notes, then quiz",
        }
    }
}

/// One topic the session will visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    pub key: TopicKey,
    pub topic_owner_id: String,
    pub topic_name: String,
    pub display_title: String,
    pub subject_name: String,
}

impl QueueItem {
    pub fn is_chapter_level(&self) -> bool {
        normalize_topic_name(&self.topic_name) == normalize_topic_name(&self.display_title)
    }
}

impl From<&TopicAggregate> for QueueItem {
    fn from(topic: &TopicAggregate) -> Self {
        Self {
            key: topic.key.clone(),
            topic_owner_id: topic.topic_owner_id.clone(),
            topic_name: topic.topic_name.clone(),
            display_title: topic.display_title.clone(),
            subject_name: topic.subject_name.clone(),
        }
    }
}

impl From<&RankedTopic> for QueueItem {
    fn from(ranked: &RankedTopic) -> Self {
        Self::from(&ranked.aggregate)
    }
}

/// Due topics for a session, highest priority first. Note-review mode takes
/// topics waiting on notes; quiz mode takes the rest.
pub fn build_queue(
    ranked: &[RankedTopic],
    mode: SessionMode,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<QueueItem> {
    let due = match mode {
        SessionMode::Quiz => quizzes_due(ranked, now),
        SessionMode::NotesThenQuiz => notes_due(ranked, now),
    };
    due.into_iter().take(limit).map(QueueItem::from).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadingTopic,
    Skipping,
    PresentingRead { unlock_at: DateTime<Utc> },
    PresentingQuestion,
    Summarizing,
    Advancing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    BeginQuiz,
    Select(usize),
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Continue,
    /// The read gate is still closed.
    Wait { remaining: Duration },
    Ignored,
    Finished(Vec<TopicResult>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    NextQuestion,
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub due: DateTime<Utc>,
    pub action: TimerAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicResult {
    pub key: TopicKey,
    pub topic_name: String,
    pub display_title: String,
    pub subject_name: String,
    pub correct: u32,
    pub total: u32,
    pub percent: f64,
    pub status: MasteryStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub queue: Vec<QueueItem>,
    pub cursor: usize,
    pub loaded_questions: Vec<Question>,
    pub loaded_notes: Vec<NoteChunk>,
    pub question_index: usize,
    /// Question index to chosen option.
    pub answers_given: BTreeMap<usize, usize>,
    pub session_results: Vec<TopicResult>,
}

/// Append-only record sink guarded by the session token.
pub trait HistoryStore {
    fn append(&self, token: &SessionToken, record: &AttemptRecord) -> Result<()>;
    fn release(&self, token: &SessionToken) -> Result<()>;
}

pub struct Collaborators<'a> {
    pub history: &'a dyn HistoryStore,
    pub content: &'a dyn ContentResolver,
    pub demand: &'a dyn DemandSink,
}

pub struct ReviewSession<'a> {
    deps: Collaborators<'a>,
    profile: Profile,
    settings: SessionSettings,
    thresholds: Thresholds,
    mode: SessionMode,
    rng: StdRng,
    token: Option<SessionToken>,
    phase: Phase,
    timer: Option<Timer>,
    state: SessionState,
}

impl<'a> ReviewSession<'a> {
    pub fn new(
        deps: Collaborators<'a>,
        token: SessionToken,
        queue: Vec<QueueItem>,
        mode: SessionMode,
        config: &AppConfig,
        seed: u64,
    ) -> Self {
        Self {
            deps,
            profile: config.profile.clone(),
            settings: config.schedule.session,
            thresholds: config.schedule.thresholds,
            mode,
            rng: StdRng::seed_from_u64(seed),
            token: Some(token),
            phase: Phase::LoadingTopic,
            timer: None,
            state: SessionState {
                queue,
                ..SessionState::default()
            },
        }
    }

    /// Load the first topic. An empty or fully skipped queue finishes here.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Response> {
        log::info!(
            "starting {} session with {} topics",
            self.mode.as_str(),
            self.state.queue.len()
        );
        self.settle(now)
    }

    pub fn handle(&mut self, event: Event, now: DateTime<Utc>) -> Result<Response> {
        if self.phase == Phase::Complete {
            return Ok(Response::Ignored);
        }

        match event {
            Event::Exit => {
                log::info!("session exited at topic {}", self.state.cursor + 1);
                self.timer = None;
                self.drop_in_flight();
                self.finish()
            }
            Event::Tick => self.fire_timer(now),
            Event::BeginQuiz => self.begin_quiz(now),
            Event::Select(option) => self.select(option, now),
        }
    }

    fn fire_timer(&mut self, now: DateTime<Utc>) -> Result<Response> {
        let Some(timer) = self.timer else {
            return Ok(Response::Ignored);
        };
        if timer.due > now {
            return Ok(Response::Ignored);
        }
        self.timer = None;

        match timer.action {
            TimerAction::NextQuestion => {
                if self.state.question_index + 1 < self.state.loaded_questions.len() {
                    self.state.question_index += 1;
                    self.phase = Phase::PresentingQuestion;
                } else {
                    self.summarize(now)?;
                }
                Ok(Response::Continue)
            }
            TimerAction::Advance => {
                self.phase = Phase::Advancing;
                self.settle(now)
            }
        }
    }

    fn begin_quiz(&mut self, now: DateTime<Utc>) -> Result<Response> {
        let Phase::PresentingRead { unlock_at } = self.phase else {
            return Ok(Response::Ignored);
        };
        if now < unlock_at {
            return Ok(Response::Wait {
                remaining: unlock_at - now,
            });
        }

        let Some(item) = self.current_item().cloned() else {
            return Ok(Response::Ignored);
        };
        let record = AttemptRecord::note_review(
            &item.topic_owner_id,
            &item.display_title,
            &item.subject_name,
            now,
        )
        .with_breakdown(breakdown_for(&item, 0, 0, None));
        self.append(&record)?;

        self.state.question_index = 0;
        self.phase = Phase::PresentingQuestion;
        Ok(Response::Continue)
    }

    fn select(&mut self, option: usize, now: DateTime<Utc>) -> Result<Response> {
        if self.phase != Phase::PresentingQuestion || self.timer.is_some() {
            return Ok(Response::Ignored);
        }
        let index = self.state.question_index;
        let Some(question) = self.state.loaded_questions.get(index) else {
            return Ok(Response::Ignored);
        };
        if option >= question.options.len() || self.state.answers_given.contains_key(&index) {
            return Ok(Response::Ignored);
        }

        self.state.answers_given.insert(index, option);
        self.timer = Some(Timer {
            due: now + self.settings.advance_delay(),
            action: TimerAction::NextQuestion,
        });
        Ok(Response::Continue)
    }

    // Run transient phases until the session needs input or a timer.
    fn settle(&mut self, now: DateTime<Utc>) -> Result<Response> {
        loop {
            match self.phase {
                Phase::LoadingTopic => self.load_topic(now),
                Phase::Skipping => {
                    self.report_skip();
                    self.state.cursor += 1;
                    self.phase = Phase::LoadingTopic;
                }
                Phase::Advancing => {
                    self.state.cursor += 1;
                    self.phase = Phase::LoadingTopic;
                }
                Phase::Complete => return self.finish(),
                Phase::PresentingRead { .. } | Phase::PresentingQuestion | Phase::Summarizing => {
                    return Ok(Response::Continue)
                }
            }
        }
    }

    fn load_topic(&mut self, now: DateTime<Utc>) {
        self.drop_in_flight();

        let Some(item) = self.current_item().cloned() else {
            self.phase = Phase::Complete;
            return;
        };

        let request = ContentRequest {
            topic_owner_id: item.topic_owner_id.clone(),
            topic_name: item.topic_name.clone(),
            display_title: item.display_title.clone(),
            subject_name: item.subject_name.clone(),
            board: self.profile.board.clone(),
            level: self.profile.level.clone(),
            stream: self.profile.stream.clone(),
        };

        let content = self.deps.content.resolve(&request).unwrap_or_default();
        let total = content.questions.len();
        let mut questions: Vec<Question> = content
            .questions
            .into_iter()
            .filter(Question::is_answerable)
            .collect();
        if questions.len() < total {
            log::warn!(
                "dropped {} malformed questions for {}",
                total - questions.len(),
                item.key
            );
        }
        if questions.is_empty() {
            self.phase = Phase::Skipping;
            return;
        }

        questions.shuffle(&mut self.rng);
        questions.truncate(self.settings.max_questions);
        log::debug!(
            "loaded {} questions for {}",
            questions.len(),
            item.key
        );
        self.state.loaded_questions = questions;
        self.state.loaded_notes = content.notes;

        self.phase = match self.mode {
            SessionMode::NotesThenQuiz if !self.state.loaded_notes.is_empty() => {
                Phase::PresentingRead {
                    unlock_at: now + self.settings.read_dwell(),
                }
            }
            _ => Phase::PresentingQuestion,
        };
    }

    fn report_skip(&self) {
        let Some(item) = self.current_item() else {
            return;
        };
        log::info!("no questions for {}, skipping", item.key);
        if let Err(e) = self
            .deps
            .demand
            .report_missing_content(&item.topic_owner_id, &item.topic_name)
        {
            log::warn!("could not report missing content for {}: {}", item.key, e);
        }
    }

    fn summarize(&mut self, now: DateTime<Utc>) -> Result<()> {
        let Some(item) = self.current_item().cloned() else {
            self.phase = Phase::Complete;
            return Ok(());
        };

        let answers: Vec<AnswerMark> = self
            .state
            .loaded_questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let chosen = self.state.answers_given.get(&i).copied();
                AnswerMark {
                    question_id: q.id.clone(),
                    chosen,
                    correct_option: q.correct_option,
                    correct: chosen == Some(q.correct_option),
                }
            })
            .collect();

        let total = answers.len() as u32;
        let correct = answers.iter().filter(|a| a.correct).count() as u32;
        let percent = percent_of(correct, total);
        let status = classify(percent, &self.thresholds);

        let record = AttemptRecord::quiz(
            &item.topic_owner_id,
            &item.display_title,
            &item.subject_name,
            now,
            correct,
            total,
        )
        .with_breakdown(breakdown_for(&item, correct, total, Some(status)))
        .with_answers(answers);
        self.append(&record)?;

        log::info!(
            "{}: {}/{} ({})",
            item.key,
            correct,
            total,
            status.as_str()
        );
        self.state.session_results.push(TopicResult {
            key: item.key,
            topic_name: item.topic_name,
            display_title: item.display_title,
            subject_name: item.subject_name,
            correct,
            total,
            percent,
            status,
        });

        self.phase = Phase::Summarizing;
        self.timer = Some(Timer {
            due: now + self.settings.summary_delay(),
            action: TimerAction::Advance,
        });
        Ok(())
    }

    fn append(&self, record: &AttemptRecord) -> Result<()> {
        match &self.token {
            Some(token) => self.deps.history.append(token, record),
            None => Ok(()),
        }
    }

    fn drop_in_flight(&mut self) {
        self.state.loaded_questions.clear();
        self.state.loaded_notes.clear();
        self.state.answers_given.clear();
        self.state.question_index = 0;
    }

    fn finish(&mut self) -> Result<Response> {
        self.phase = Phase::Complete;
        self.timer = None;
        if let Some(token) = self.token.take() {
            self.deps.history.release(&token)?;
        }
        log::info!(
            "session complete with {} results",
            self.state.session_results.len()
        );
        Ok(Response::Finished(self.state.session_results.clone()))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn timer(&self) -> Option<Timer> {
        self.timer
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.state.queue.get(self.state.cursor)
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::PresentingQuestion => self.state.loaded_questions.get(self.state.question_index),
            _ => None,
        }
    }

    pub fn current_answer(&self) -> Option<usize> {
        self.state
            .answers_given
            .get(&self.state.question_index)
            .copied()
    }

    pub fn notes(&self) -> &[NoteChunk] {
        &self.state.loaded_notes
    }

    pub fn results(&self) -> &[TopicResult] {
        &self.state.session_results
    }

    pub fn last_result(&self) -> Option<&TopicResult> {
        self.state.session_results.last()
    }

    pub fn read_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.phase {
            Phase::PresentingRead { unlock_at } if now < unlock_at => Some(unlock_at - now),
            Phase::PresentingRead { .. } => Some(Duration::zero()),
            _ => None,
        }
    }
}

impl Drop for ReviewSession<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.deps.history.release(&token) {
                log::warn!("failed to release session for {}: {}", token.learner, e);
            }
        }
    }
}

// Chapter-level topics are attributed through the record title; sub-topics
// carry their own breakdown entry.
fn breakdown_for(
    item: &QueueItem,
    correct: u32,
    total: u32,
    status: Option<MasteryStatus>,
) -> Vec<BreakdownEntry> {
    if item.is_chapter_level() {
        return Vec::new();
    }
    vec![BreakdownEntry {
        name: item.topic_name.clone(),
        status,
        percent: percent_of(correct, total),
        total,
        correct,
    }]
}
