use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// What kind of event an attempt records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptKind {
    Quiz,
    NoteReview,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptKind::Quiz => "quiz",
            AttemptKind::NoteReview => "note_review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiz" | "q" | "mcq" => Some(AttemptKind::Quiz),
            "note_review" | "notes" | "note" | "n" | "revision" => Some(AttemptKind::NoteReview),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptKind::Quiz => "Quiz",
            AttemptKind::NoteReview => "Notes",
        }
    }
}

// Mastery classification, ordered weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryStatus {
    Weak,
    Average,
    Strong,
    Excellent,
}

impl MasteryStatus {
    pub const ALL: [MasteryStatus; 4] = [
        MasteryStatus::Weak,
        MasteryStatus::Average,
        MasteryStatus::Strong,
        MasteryStatus::Excellent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryStatus::Weak => "WEAK",
            MasteryStatus::Average => "AVERAGE",
            MasteryStatus::Strong => "STRONG",
            MasteryStatus::Excellent => "EXCELLENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weak" => Some(MasteryStatus::Weak),
            "average" | "avg" => Some(MasteryStatus::Average),
            "strong" => Some(MasteryStatus::Strong),
            "excellent" => Some(MasteryStatus::Excellent),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MasteryStatus::Weak => "Weak",
            MasteryStatus::Average => "Average",
            MasteryStatus::Strong => "Strong",
            MasteryStatus::Excellent => "Excellent",
        }
    }
}

/// Identity of a schedulable topic: the owning chapter plus the topic name,
/// normalized so that "Photosynthesis " and "photosynthesis" are the same topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicKey {
    owner_id: String,
    name: String,
}

impl TopicKey {
    pub fn new(owner_id: &str, topic_name: &str) -> Self {
        Self {
            owner_id: owner_id.trim().to_string(),
            name: normalize_topic_name(topic_name),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner_id, self.name)
    }
}

pub fn normalize_topic_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// One topic's slice of a multi-topic attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub name: String,
    #[serde(default)]
    pub status: Option<MasteryStatus>,
    #[serde(default)]
    pub percent: f64,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub correct: u32,
}

impl BreakdownEntry {
    /// Score for this slice; counted questions win over the stored percent.
    pub fn score_percent(&self) -> f64 {
        if self.total > 0 {
            percent_of(self.correct, self.total)
        } else if self.percent.is_finite() {
            self.percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

// Right/wrong mark for one presented question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMark {
    pub question_id: String,
    pub chosen: Option<usize>,
    pub correct_option: usize,
    pub correct: bool,
}

/// An immutable fact: the learner took a quiz or read notes for a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: String,
    pub topic_owner_id: String,
    pub display_title: String,
    pub subject_name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AttemptKind,
    pub total_questions: u32,
    pub correct_count: u32,
    #[serde(default)]
    pub topic_breakdown: Vec<BreakdownEntry>,
    #[serde(default)]
    pub answers: Vec<AnswerMark>,
}

impl AttemptRecord {
    pub fn quiz(
        topic_owner_id: &str,
        display_title: &str,
        subject_name: &str,
        timestamp: DateTime<Utc>,
        correct_count: u32,
        total_questions: u32,
    ) -> Self {
        Self {
            id: new_attempt_id(AttemptKind::Quiz, timestamp),
            topic_owner_id: topic_owner_id.to_string(),
            display_title: display_title.to_string(),
            subject_name: subject_name.to_string(),
            timestamp,
            kind: AttemptKind::Quiz,
            total_questions,
            correct_count,
            topic_breakdown: Vec::new(),
            answers: Vec::new(),
        }
    }

    pub fn note_review(
        topic_owner_id: &str,
        display_title: &str,
        subject_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_attempt_id(AttemptKind::NoteReview, timestamp),
            topic_owner_id: topic_owner_id.to_string(),
            display_title: display_title.to_string(),
            subject_name: subject_name.to_string(),
            timestamp,
            kind: AttemptKind::NoteReview,
            total_questions: 0,
            correct_count: 0,
            topic_breakdown: Vec::new(),
            answers: Vec::new(),
        }
    }

    pub fn with_breakdown(mut self, breakdown: Vec<BreakdownEntry>) -> Self {
        self.topic_breakdown = breakdown;
        self
    }

    pub fn with_answers(mut self, answers: Vec<AnswerMark>) -> Self {
        self.answers = answers;
        self
    }

    pub fn percent(&self) -> f64 {
        percent_of(self.correct_count, self.total_questions)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.topic_owner_id.trim().is_empty() {
            return Err("topic owner id must not be empty".to_string());
        }
        if self.correct_count > self.total_questions {
            return Err(format!(
                "correct count {} exceeds total questions {}",
                self.correct_count, self.total_questions
            ));
        }
        if let Some(entry) = self
            .topic_breakdown
            .iter()
            .find(|e| e.correct > e.total)
        {
            return Err(format!(
                "breakdown '{}' has {} correct out of {}",
                entry.name, entry.correct, entry.total
            ));
        }
        if let Some(entry) = self
            .topic_breakdown
            .iter()
            .find(|e| !(0.0..=100.0).contains(&e.percent))
        {
            return Err(format!(
                "breakdown '{}' has percent {} outside 0..=100",
                entry.name, entry.percent
            ));
        }
        Ok(())
    }
}

fn new_attempt_id(kind: AttemptKind, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{:08x}",
        kind.as_str(),
        timestamp.timestamp_millis(),
        rand::random::<u32>()
    )
}

pub fn percent_of(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        (correct as f64 / total as f64) * 100.0
    }
}

// Which accuracy figure drives classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreView {
    #[default]
    Latest,
    AllTime,
}

impl ScoreView {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "latest" | "last" => Some(ScoreView::Latest),
            "all_time" | "all-time" | "alltime" | "all" => Some(ScoreView::AllTime),
            _ => None,
        }
    }
}

/// Running state for one topic, folded from history. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAggregate {
    pub key: TopicKey,
    pub topic_name: String,
    pub topic_owner_id: String,
    pub display_title: String,
    pub subject_name: String,
    pub status: MasteryStatus,
    pub accuracy_percent: f64,
    pub latest_percent: f64,
    pub total_attempted: u32,
    pub total_correct: u32,
    pub quiz_count: u32,
    pub last_quiz_date: Option<DateTime<Utc>>,
    pub last_note_review_date: Option<DateTime<Utc>>,
    pub mastery_streak: u32,
}

impl TopicAggregate {
    /// Whichever of quiz / note review happened last. A note review only
    /// counts as last when it is strictly newer than the last quiz.
    pub fn last_action(&self) -> Option<(AttemptKind, DateTime<Utc>)> {
        match (self.last_quiz_date, self.last_note_review_date) {
            (Some(quiz), Some(notes)) if notes > quiz => Some((AttemptKind::NoteReview, notes)),
            (Some(quiz), _) => Some((AttemptKind::Quiz, quiz)),
            (None, Some(notes)) => Some((AttemptKind::NoteReview, notes)),
            (None, None) => None,
        }
    }

    pub fn is_chapter_level(&self) -> bool {
        normalize_topic_name(&self.topic_name) == normalize_topic_name(&self.display_title)
    }
}

// Next due action for a topic; at most one side is ever set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub key: TopicKey,
    pub next_note_review_due: Option<DateTime<Utc>>,
    pub next_quiz_due: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.next_note_review_due.or(self.next_quiz_due)
    }

    pub fn next_action(&self) -> Option<AttemptKind> {
        match (self.next_note_review_due, self.next_quiz_due) {
            (Some(_), _) => Some(AttemptKind::NoteReview),
            (None, Some(_)) => Some(AttemptKind::Quiz),
            (None, None) => None,
        }
    }

    /// No due date means the topic has never been seen and is eligible now.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.due_at() {
            Some(due) => due <= now,
            None => true,
        }
    }
}

// Study content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteChunk {
    pub topic: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    /// Has options to pick from and a correct option among them.
    pub fn is_answerable(&self) -> bool {
        self.correct_option < self.options.len()
    }
}

/// Everything stored for one chapter: per-topic notes, the question bank and
/// optional whole-chapter text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterBundle {
    #[serde(default)]
    pub notes: Vec<NoteChunk>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicContent {
    pub notes: Vec<NoteChunk>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandReport {
    pub id: i64,
    pub topic_owner_id: String,
    pub topic_name: String,
    pub reported_at: String,
}

/// Proof that the holder owns the one active review session of a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub learner: String,
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
