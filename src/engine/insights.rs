use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AttemptKind, AttemptRecord, MasteryStatus, TopicAggregate, TopicKey};

use super::rank::RankedTopic;

const PLAN_SIZE: usize = 5;
const LAST_WEEK_BUCKET: u32 = 5;
const DEFAULT_PRACTICE: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct WeekBucket {
    pub week: u32,
    pub label: String,
    pub topics: Vec<RankedTopic>,
}

/// Group scheduled topics by how far away their due date is. Overdue and
/// never-scheduled topics land in week 1; anything beyond four weeks shares
/// the last bucket. Each week lists its weakest topics first.
pub fn weekly_breakdown(ranked: &[RankedTopic], now: DateTime<Utc>) -> Vec<WeekBucket> {
    let mut weeks: BTreeMap<u32, Vec<RankedTopic>> = BTreeMap::new();

    for topic in ranked {
        let week = week_of(topic, now);
        weeks.entry(week).or_default().push(topic.clone());
    }

    weeks
        .into_iter()
        .map(|(week, mut topics)| {
            topics.sort_by(|a, b| {
                a.aggregate
                    .accuracy_percent
                    .total_cmp(&b.aggregate.accuracy_percent)
            });
            WeekBucket {
                week,
                label: week_label(week),
                topics,
            }
        })
        .collect()
}

fn week_of(topic: &RankedTopic, now: DateTime<Utc>) -> u32 {
    let Some(due) = topic.schedule.due_at() else {
        return 1;
    };
    if due <= now {
        return 1;
    }
    let days = ((due - now).num_seconds() as f64 / 86_400.0).ceil() as u32;
    (days.saturating_sub(1) / 7 + 1).min(LAST_WEEK_BUCKET)
}

fn week_label(week: u32) -> String {
    if week >= LAST_WEEK_BUCKET {
        format!("Week {}+", LAST_WEEK_BUCKET)
    } else {
        format!("Week {}", week)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub key: TopicKey,
    pub topic_name: String,
    pub display_title: String,
    pub subject_name: String,
    pub accuracy_percent: f64,
    pub practice_questions: u32,
    pub suggestion: String,
}

/// Up to five WEAK topics, lowest accuracy first.
pub fn study_plan(topics: &[TopicAggregate]) -> Vec<PlanStep> {
    let mut weak: Vec<&TopicAggregate> = topics
        .iter()
        .filter(|t| t.status == MasteryStatus::Weak)
        .collect();
    weak.sort_by(|a, b| a.accuracy_percent.total_cmp(&b.accuracy_percent));

    weak.into_iter()
        .take(PLAN_SIZE)
        .map(|t| {
            let practice = if t.total_attempted > 0 {
                t.total_attempted.min(20)
            } else {
                DEFAULT_PRACTICE
            };
            PlanStep {
                key: t.key.clone(),
                topic_name: t.topic_name.clone(),
                display_title: t.display_title.clone(),
                subject_name: t.subject_name.clone(),
                accuracy_percent: t.accuracy_percent,
                practice_questions: practice,
                suggestion: format!(
                    "Review the notes for {}, then practise {} questions",
                    t.topic_name, practice
                ),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTopic {
    pub key: TopicKey,
    pub topic_name: String,
    pub display_title: String,
    pub subject_name: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Topics whose notes were reviewed on the same UTC day as `now`, each once.
pub fn completed_today(history: &[AttemptRecord], now: DateTime<Utc>) -> Vec<CompletedTopic> {
    let today = now.date_naive();
    let mut seen: HashSet<TopicKey> = HashSet::new();
    let mut done = Vec::new();

    let mut records: Vec<&AttemptRecord> = history
        .iter()
        .filter(|r| r.kind == AttemptKind::NoteReview && r.timestamp.date_naive() == today)
        .collect();
    records.sort_by_key(|r| r.timestamp);

    for record in records {
        let names: Vec<&str> = if record.topic_breakdown.is_empty() {
            vec![record.display_title.as_str()]
        } else {
            record
                .topic_breakdown
                .iter()
                .map(|e| e.name.as_str())
                .collect()
        };

        for name in names {
            let key = TopicKey::new(&record.topic_owner_id, name);
            if seen.insert(key.clone()) {
                done.push(CompletedTopic {
                    key,
                    topic_name: name.trim().to_string(),
                    display_title: record.display_title.clone(),
                    subject_name: record.subject_name.clone(),
                    reviewed_at: record.timestamp,
                });
            }
        }
    }

    done
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_attempts: usize,
    pub quiz_attempts: usize,
    pub note_reviews: usize,
    pub tracked_topics: usize,
    pub weak: usize,
    pub average: usize,
    pub strong: usize,
    pub excellent: usize,
    pub due_now: usize,
}

pub fn stats(history: &[AttemptRecord], ranked: &[RankedTopic], now: DateTime<Utc>) -> Stats {
    let mut stats = Stats {
        total_attempts: history.len(),
        quiz_attempts: history.iter().filter(|r| r.kind == AttemptKind::Quiz).count(),
        note_reviews: history
            .iter()
            .filter(|r| r.kind == AttemptKind::NoteReview)
            .count(),
        tracked_topics: ranked.len(),
        ..Stats::default()
    };

    for topic in ranked {
        match topic.aggregate.status {
            MasteryStatus::Weak => stats.weak += 1,
            MasteryStatus::Average => stats.average += 1,
            MasteryStatus::Strong => stats.strong += 1,
            MasteryStatus::Excellent => stats.excellent += 1,
        }
        if topic.is_due(now) {
            stats.due_now += 1;
        }
    }

    stats
}
