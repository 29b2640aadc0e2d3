use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::Thresholds;
use crate::models::{
    percent_of, AttemptKind, AttemptRecord, MasteryStatus, ScoreView, TopicAggregate, TopicKey,
};

use super::classify::{breaks_streak, classify, is_mastery_attempt};

const FALLBACK_TITLE: &str = "Chapter";

// The part of a record attributed to one topic
struct Slice<'a> {
    name: &'a str,
    correct: u32,
    total: u32,
    percent: f64,
}

/// Fold history into one aggregate per topic, oldest record first.
///
/// Records older than `since` are ignored. A record id seen twice is only
/// counted once. Aggregates come back in order of first appearance.
pub fn aggregate(
    history: &[AttemptRecord],
    since: Option<DateTime<Utc>>,
    thresholds: &Thresholds,
    view: ScoreView,
) -> Vec<TopicAggregate> {
    let mut ordered: Vec<&AttemptRecord> = history
        .iter()
        .filter(|r| since.map_or(true, |cutoff| r.timestamp >= cutoff))
        .collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut index: HashMap<TopicKey, usize> = HashMap::new();
    let mut topics: Vec<TopicAggregate> = Vec::new();

    for record in ordered {
        if !seen.insert(record.id.as_str()) {
            log::debug!("skipping duplicate attempt {}", record.id);
            continue;
        }

        for slice in slices(record) {
            let key = TopicKey::new(&record.topic_owner_id, slice.name);
            let slot = match index.get(&key) {
                Some(&i) => i,
                None => {
                    topics.push(fresh(key.clone(), record, slice.name));
                    index.insert(key, topics.len() - 1);
                    topics.len() - 1
                }
            };
            apply(&mut topics[slot], record, &slice, thresholds, view);
        }
    }

    topics
}

// A breakdown splits the record across sub-topics; without one the whole
// record belongs to the chapter-level topic.
fn slices(record: &AttemptRecord) -> Vec<Slice<'_>> {
    let from_breakdown: Vec<Slice<'_>> = record
        .topic_breakdown
        .iter()
        .filter(|entry| !entry.name.trim().is_empty())
        .map(|entry| Slice {
            name: entry.name.as_str(),
            correct: entry.correct,
            total: entry.total,
            percent: entry.score_percent(),
        })
        .collect();

    if !from_breakdown.is_empty() {
        return from_breakdown;
    }

    let title = if record.display_title.trim().is_empty() {
        FALLBACK_TITLE
    } else {
        record.display_title.as_str()
    };

    vec![Slice {
        name: title,
        correct: record.correct_count,
        total: record.total_questions,
        percent: record.percent(),
    }]
}

fn fresh(key: TopicKey, record: &AttemptRecord, name: &str) -> TopicAggregate {
    TopicAggregate {
        key,
        topic_name: name.trim().to_string(),
        topic_owner_id: record.topic_owner_id.clone(),
        display_title: record.display_title.clone(),
        subject_name: record.subject_name.clone(),
        status: MasteryStatus::Average,
        accuracy_percent: 0.0,
        latest_percent: 0.0,
        total_attempted: 0,
        total_correct: 0,
        quiz_count: 0,
        last_quiz_date: None,
        last_note_review_date: None,
        mastery_streak: 0,
    }
}

fn apply(
    topic: &mut TopicAggregate,
    record: &AttemptRecord,
    slice: &Slice<'_>,
    thresholds: &Thresholds,
    view: ScoreView,
) {
    if !record.display_title.trim().is_empty() {
        topic.display_title = record.display_title.clone();
    }
    if !record.subject_name.trim().is_empty() {
        topic.subject_name = record.subject_name.clone();
    }

    match record.kind {
        AttemptKind::NoteReview => {
            topic.last_note_review_date = Some(record.timestamp);
        }
        AttemptKind::Quiz => {
            topic.last_quiz_date = Some(record.timestamp);
            topic.quiz_count += 1;
            topic.total_attempted += slice.total;
            topic.total_correct += slice.correct;
            topic.latest_percent = slice.percent;

            if is_mastery_attempt(slice.percent, thresholds) {
                topic.mastery_streak += 1;
            } else if breaks_streak(slice.percent, thresholds) {
                topic.mastery_streak = 0;
            }

            topic.accuracy_percent = match view {
                ScoreView::Latest => slice.percent,
                ScoreView::AllTime if topic.total_attempted > 0 => {
                    percent_of(topic.total_correct, topic.total_attempted)
                }
                ScoreView::AllTime => slice.percent,
            };
            topic.status = classify(topic.accuracy_percent, thresholds);
        }
    }
}
