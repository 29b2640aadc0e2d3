use chrono::Duration;

use crate::config::{IntervalPair, IntervalTable, ScheduleConfig, MAX_INTERVAL_SECS};
use crate::models::{AttemptKind, MasteryStatus, ScheduleEntry, TopicAggregate};

pub fn base_intervals(status: MasteryStatus, table: &IntervalTable) -> IntervalPair {
    match status {
        MasteryStatus::Weak => table.weak,
        MasteryStatus::Average => table.average,
        MasteryStatus::Strong | MasteryStatus::Excellent => table.strong,
    }
}

/// Exponential backoff: a streak of 0 or 1 keeps the base interval, each
/// further mastery attempt multiplies it by `factor` (floored to seconds).
pub fn scaled_interval(base: Duration, streak: u32, factor: f64) -> Duration {
    if streak <= 1 {
        return base;
    }

    let multiplier = factor.powi((streak - 1).min(i32::MAX as u32) as i32);
    let secs = (base.num_seconds() as f64 * multiplier).floor();
    let secs = if secs.is_finite() {
        (secs as i64).min(MAX_INTERVAL_SECS)
    } else {
        MAX_INTERVAL_SECS
    };

    Duration::seconds(secs)
}

/// The next action is always the other phase: after a quiz comes a note
/// review, after a note review comes a quiz.
pub fn schedule(topic: &TopicAggregate, config: &ScheduleConfig) -> ScheduleEntry {
    let mut entry = ScheduleEntry {
        key: topic.key.clone(),
        next_note_review_due: None,
        next_quiz_due: None,
    };

    let Some((kind, at)) = topic.last_action() else {
        return entry;
    };

    let base = base_intervals(topic.status, &config.intervals);
    let streak = topic.mastery_streak;

    match kind {
        AttemptKind::Quiz => {
            let gap = scaled_interval(base.note_review(), streak, config.backoff_factor);
            entry.next_note_review_due = at.checked_add_signed(gap);
        }
        AttemptKind::NoteReview => {
            let gap = scaled_interval(base.quiz(), streak, config.backoff_factor);
            entry.next_quiz_due = at.checked_add_signed(gap);
        }
    }

    entry
}

pub fn schedule_all(topics: &[TopicAggregate], config: &ScheduleConfig) -> Vec<ScheduleEntry> {
    topics.iter().map(|t| schedule(t, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::engine::aggregate::aggregate;
    use crate::models::{AttemptRecord, ScoreView, TopicKey};
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn topic_from(history: &[AttemptRecord]) -> TopicAggregate {
        aggregate(history, None, &Thresholds::default(), ScoreView::Latest)
            .into_iter()
            .next()
            .unwrap()
    }

    fn quiz(at: DateTime<Utc>, correct: u32) -> AttemptRecord {
        AttemptRecord::quiz("bio-7", "Photosynthesis", "Biology", at, correct, 10)
    }

    fn notes(at: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord::note_review("bio-7", "Photosynthesis", "Biology", at)
    }

    mod backoff_tests {
        use super::*;

        #[test]
        fn streak_zero_and_one_are_unscaled() {
            let base = Duration::days(7);
            assert_eq!(scaled_interval(base, 0, 1.5), base);
            assert_eq!(scaled_interval(base, 1, 1.5), base);
        }

        #[test]
        fn second_and_third_mastery_attempts_scale() {
            let base = Duration::days(7);
            assert_eq!(
                scaled_interval(base, 2, 1.5),
                Duration::seconds((7.0 * 86_400.0 * 1.5) as i64)
            );
            assert_eq!(
                scaled_interval(base, 3, 1.5),
                Duration::seconds((7.0 * 86_400.0 * 2.25) as i64)
            );
        }

        #[test]
        fn result_is_floored() {
            assert_eq!(scaled_interval(Duration::seconds(3), 2, 1.5), Duration::seconds(4));
            assert_eq!(scaled_interval(Duration::seconds(5), 2, 1.5), Duration::seconds(7));
        }

        #[test]
        fn monotonic_as_streak_grows() {
            for base in [Duration::days(1), Duration::days(3), Duration::days(7)] {
                let mut previous = scaled_interval(base, 0, 1.5);
                for streak in 1..200 {
                    let next = scaled_interval(base, streak, 1.5);
                    assert!(next >= previous, "interval shrank at streak {}", streak);
                    previous = next;
                }
            }
        }

        #[test]
        fn huge_streak_is_capped() {
            let capped = scaled_interval(Duration::days(7), u32::MAX, 1.5);
            assert_eq!(capped, Duration::seconds(MAX_INTERVAL_SECS));
        }

        #[test]
        fn excellent_uses_strong_band() {
            let table = IntervalTable::default();
            assert_eq!(base_intervals(MasteryStatus::Excellent, &table), table.strong);
            assert_eq!(base_intervals(MasteryStatus::Strong, &table), table.strong);
            assert_eq!(base_intervals(MasteryStatus::Weak, &table), table.weak);
        }
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn weak_quiz_schedules_note_review_next_day() {
            let topic = topic_from(&[quiz(t0(), 3)]);
            let entry = schedule(&topic, &ScheduleConfig::default());
            assert_eq!(entry.next_note_review_due, Some(t0() + Duration::days(1)));
            assert_eq!(entry.next_quiz_due, None);
        }

        #[test]
        fn first_mastery_attempt_uses_unscaled_strong_interval() {
            let review = t0() + Duration::days(1);
            let quiz_at = review + Duration::minutes(10);
            let topic = topic_from(&[quiz(t0(), 3), notes(review), quiz(quiz_at, 9)]);
            assert_eq!(topic.status, MasteryStatus::Excellent);
            assert_eq!(topic.mastery_streak, 1);

            let entry = schedule(&topic, &ScheduleConfig::default());
            assert_eq!(entry.next_quiz_due, None);
            assert_eq!(entry.next_note_review_due, Some(quiz_at + Duration::days(7)));
        }

        #[test]
        fn second_mastery_attempt_scales_by_one_and_a_half() {
            let review = t0() + Duration::days(1);
            let q2 = review + Duration::minutes(10);
            let q3 = q2 + Duration::days(7);
            let topic = topic_from(&[quiz(t0(), 3), notes(review), quiz(q2, 9), quiz(q3, 8)]);
            assert_eq!(topic.mastery_streak, 2);

            let entry = schedule(&topic, &ScheduleConfig::default());
            let expected = Duration::seconds((7.0 * 86_400.0 * 1.5_f64).floor() as i64);
            assert_eq!(entry.next_note_review_due, Some(q3 + expected));
        }

        #[test]
        fn note_review_schedules_quiz() {
            let review = t0() + Duration::days(1);
            let topic = topic_from(&[quiz(t0(), 3), notes(review)]);
            let entry = schedule(&topic, &ScheduleConfig::default());
            assert_eq!(entry.next_note_review_due, None);
            assert_eq!(entry.next_quiz_due, Some(review + Duration::days(3)));
        }

        #[test]
        fn custom_intervals_are_read_from_config() {
            let mut config = ScheduleConfig::default();
            config.intervals.weak = IntervalPair::days(2, 4);
            let topic = topic_from(&[quiz(t0(), 1)]);
            let entry = schedule(&topic, &config);
            assert_eq!(entry.next_note_review_due, Some(t0() + Duration::days(2)));
        }
    }

    mod alternation_tests {
        use super::*;

        #[test]
        fn never_both_dates_set() {
            let mut history = Vec::new();
            let mut at = t0();
            for step in 0..12 {
                at += Duration::hours(7);
                if step % 3 == 0 {
                    history.push(notes(at));
                } else {
                    history.push(quiz(at, (step * 3 % 11) as u32));
                }
                let topic = topic_from(&history);
                let entry = schedule(&topic, &ScheduleConfig::default());
                let set = [entry.next_note_review_due, entry.next_quiz_due]
                    .iter()
                    .filter(|d| d.is_some())
                    .count();
                assert_eq!(set, 1, "step {}", step);

                let expected = match topic.last_action().unwrap().0 {
                    AttemptKind::Quiz => AttemptKind::NoteReview,
                    AttemptKind::NoteReview => AttemptKind::Quiz,
                };
                assert_eq!(entry.next_action(), Some(expected));
            }
        }

        #[test]
        fn topic_without_history_has_no_gate() {
            let topic = TopicAggregate {
                key: TopicKey::new("x", "y"),
                topic_name: "y".into(),
                topic_owner_id: "x".into(),
                display_title: "Y".into(),
                subject_name: "S".into(),
                status: MasteryStatus::Average,
                accuracy_percent: 0.0,
                latest_percent: 0.0,
                total_attempted: 0,
                total_correct: 0,
                quiz_count: 0,
                last_quiz_date: None,
                last_note_review_date: None,
                mastery_streak: 0,
            };
            let entry = schedule(&topic, &ScheduleConfig::default());
            assert_eq!(entry.due_at(), None);
            assert!(entry.is_due(t0()));
        }
    }
}
