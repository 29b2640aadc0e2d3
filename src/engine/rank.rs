use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{RankWeights, ScheduleConfig};
use crate::models::{AttemptKind, MasteryStatus, ScheduleEntry, TopicAggregate};

use super::schedule::schedule;

const SECS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTopic {
    pub aggregate: TopicAggregate,
    pub schedule: ScheduleEntry,
    pub score: f64,
    pub days_overdue: f64,
}

impl RankedTopic {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_due(now)
    }

    pub fn next_action(&self) -> Option<AttemptKind> {
        self.schedule.next_action()
    }
}

/// Fractional days past the due date; never negative, and zero for topics
/// that have no due date yet.
pub fn days_overdue(entry: &ScheduleEntry, now: DateTime<Utc>) -> f64 {
    match entry.due_at() {
        Some(due) if due < now => (now - due).num_seconds() as f64 / SECS_PER_DAY,
        _ => 0.0,
    }
}

fn status_bonus(status: MasteryStatus, weights: &RankWeights) -> f64 {
    match status {
        MasteryStatus::Weak => weights.weak_bonus,
        MasteryStatus::Average => weights.average_bonus,
        MasteryStatus::Strong | MasteryStatus::Excellent => weights.strong_bonus,
    }
}

pub fn priority_score(
    topic: &TopicAggregate,
    days_overdue: f64,
    weights: &RankWeights,
) -> f64 {
    (100.0 - topic.accuracy_percent) * weights.accuracy
        + days_overdue * weights.overdue_per_day
        + status_bonus(topic.status, weights)
}

/// Schedule and score every topic, highest priority first. Equal scores keep
/// their input order.
pub fn rank(
    topics: Vec<TopicAggregate>,
    config: &ScheduleConfig,
    now: DateTime<Utc>,
) -> Vec<RankedTopic> {
    let mut ranked: Vec<RankedTopic> = topics
        .into_iter()
        .map(|aggregate| {
            let schedule = schedule(&aggregate, config);
            let overdue = days_overdue(&schedule, now);
            let score = priority_score(&aggregate, overdue, &config.weights);
            RankedTopic {
                aggregate,
                schedule,
                score,
                days_overdue: overdue,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

pub fn due_queue(ranked: &[RankedTopic], now: DateTime<Utc>) -> Vec<&RankedTopic> {
    ranked.iter().filter(|r| r.is_due(now)).collect()
}

pub fn notes_due(ranked: &[RankedTopic], now: DateTime<Utc>) -> Vec<&RankedTopic> {
    ranked
        .iter()
        .filter(|r| r.is_due(now) && r.next_action() == Some(AttemptKind::NoteReview))
        .collect()
}

// Never-seen topics are quiz candidates as well
pub fn quizzes_due(ranked: &[RankedTopic], now: DateTime<Utc>) -> Vec<&RankedTopic> {
    ranked
        .iter()
        .filter(|r| r.is_due(now) && r.next_action() != Some(AttemptKind::NoteReview))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicKey;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    fn topic(name: &str, status: MasteryStatus, accuracy: f64) -> TopicAggregate {
        TopicAggregate {
            key: TopicKey::new("ch-1", name),
            topic_name: name.to_string(),
            topic_owner_id: "ch-1".to_string(),
            display_title: "Chapter One".to_string(),
            subject_name: "Science".to_string(),
            status,
            accuracy_percent: accuracy,
            latest_percent: accuracy,
            total_attempted: 10,
            total_correct: (accuracy / 10.0) as u32,
            quiz_count: 1,
            last_quiz_date: None,
            last_note_review_date: None,
            mastery_streak: 0,
        }
    }

    fn quizzed_at(mut t: TopicAggregate, at: DateTime<Utc>) -> TopicAggregate {
        t.last_quiz_date = Some(at);
        t
    }

    fn reviewed_at(mut t: TopicAggregate, at: DateTime<Utc>) -> TopicAggregate {
        t.last_note_review_date = Some(at);
        t
    }

    mod score_tests {
        use super::*;

        #[test]
        fn default_formula() {
            let weights = RankWeights::default();
            let t = topic("A", MasteryStatus::Weak, 30.0);
            assert_eq!(priority_score(&t, 2.0, &weights), 140.0 + 20.0 + 500.0);

            let t = topic("B", MasteryStatus::Average, 60.0);
            assert_eq!(priority_score(&t, 0.0, &weights), 80.0 + 200.0);

            let t = topic("C", MasteryStatus::Excellent, 90.0);
            assert_eq!(priority_score(&t, 0.0, &weights), 20.0);
        }

        #[test]
        fn not_yet_due_is_never_negative() {
            let entry = ScheduleEntry {
                key: TopicKey::new("ch", "x"),
                next_note_review_due: Some(now() + Duration::days(4)),
                next_quiz_due: None,
            };
            assert_eq!(days_overdue(&entry, now()), 0.0);
        }

        #[test]
        fn overdue_is_fractional() {
            let entry = ScheduleEntry {
                key: TopicKey::new("ch", "x"),
                next_note_review_due: None,
                next_quiz_due: Some(now() - Duration::hours(36)),
            };
            assert_eq!(days_overdue(&entry, now()), 1.5);
        }

        #[test]
        fn unscheduled_topic_has_no_age_pressure() {
            let entry = ScheduleEntry {
                key: TopicKey::new("ch", "x"),
                next_note_review_due: None,
                next_quiz_due: None,
            };
            assert_eq!(days_overdue(&entry, now()), 0.0);
        }
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn weak_overdue_beats_strong_not_due() {
            // weak note review was due 10 days ago
            let weak = quizzed_at(
                topic("Weak", MasteryStatus::Weak, 40.0),
                now() - Duration::days(11),
            );
            let strong = quizzed_at(
                topic("Strong", MasteryStatus::Strong, 70.0),
                now() - Duration::days(1),
            );

            let ranked = rank(vec![strong, weak], &ScheduleConfig::default(), now());
            assert_eq!(ranked[0].aggregate.topic_name, "Weak");
            assert_eq!(ranked[0].days_overdue, 10.0);
            assert!(ranked[0].score > ranked[1].score);
            assert_eq!(ranked[1].days_overdue, 0.0);
        }

        #[test]
        fn ties_keep_input_order() {
            let a = topic("First", MasteryStatus::Average, 55.0);
            let b = topic("Second", MasteryStatus::Average, 55.0);
            let c = topic("Third", MasteryStatus::Average, 55.0);

            let ranked = rank(vec![a, b, c], &ScheduleConfig::default(), now());
            let names: Vec<_> = ranked.iter().map(|r| r.aggregate.topic_name.as_str()).collect();
            assert_eq!(names, vec!["First", "Second", "Third"]);
        }

        #[test]
        fn sorted_descending() {
            let ranked = rank(
                vec![
                    topic("Strong", MasteryStatus::Strong, 75.0),
                    topic("Weak", MasteryStatus::Weak, 10.0),
                    topic("Avg", MasteryStatus::Average, 60.0),
                ],
                &ScheduleConfig::default(),
                now(),
            );
            for pair in ranked.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
            assert_eq!(ranked[0].aggregate.topic_name, "Weak");
        }

        #[test]
        fn empty_input_is_empty_result() {
            assert!(rank(Vec::new(), &ScheduleConfig::default(), now()).is_empty());
        }
    }

    mod due_tests {
        use super::*;

        fn fixture() -> Vec<RankedTopic> {
            let notes_pending = quizzed_at(
                topic("Needs notes", MasteryStatus::Weak, 20.0),
                now() - Duration::days(2),
            );
            let quiz_pending = reviewed_at(
                topic("Needs quiz", MasteryStatus::Weak, 20.0),
                now() - Duration::days(4),
            );
            let fresh = topic("Never seen", MasteryStatus::Average, 0.0);
            let later = quizzed_at(
                topic("Later", MasteryStatus::Strong, 70.0),
                now() - Duration::hours(1),
            );
            rank(
                vec![notes_pending, quiz_pending, fresh, later],
                &ScheduleConfig::default(),
                now(),
            )
        }

        fn names(list: Vec<&RankedTopic>) -> Vec<String> {
            let mut out: Vec<String> = list.iter().map(|r| r.aggregate.topic_name.clone()).collect();
            out.sort();
            out
        }

        #[test]
        fn due_queue_excludes_future() {
            let ranked = fixture();
            assert_eq!(
                names(due_queue(&ranked, now())),
                vec!["Needs notes", "Needs quiz", "Never seen"]
            );
        }

        #[test]
        fn notes_and_quizzes_split() {
            let ranked = fixture();
            assert_eq!(names(notes_due(&ranked, now())), vec!["Needs notes"]);
            assert_eq!(
                names(quizzes_due(&ranked, now())),
                vec!["Needs quiz", "Never seen"]
            );
        }
    }
}
