//! Mastery tracking and spaced-repetition scheduling.
//!
//! Everything in here is a pure function of attempt history, configuration
//! and an explicit `now`. Nothing returns an error: a bad record degrades to
//! a chapter-level attribution and the pass carries on.

pub mod aggregate;
pub mod classify;
pub mod insights;
pub mod rank;
pub mod schedule;

use chrono::{DateTime, Duration, Utc};

use crate::config::{AppConfig, MAX_WINDOW_DAYS};
use crate::models::AttemptRecord;

pub use aggregate::aggregate;
pub use classify::classify;
pub use insights::{completed_today, stats, study_plan, weekly_breakdown, Stats};
pub use rank::{due_queue, notes_due, quizzes_due, rank, RankedTopic};
pub use schedule::{schedule, schedule_all, scaled_interval};

/// Aggregate, classify, schedule and rank in one go.
pub fn scheduling_pass(
    history: &[AttemptRecord],
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Vec<RankedTopic> {
    let since = config
        .history_window_days
        .map(|days| Duration::days(days.clamp(0, MAX_WINDOW_DAYS)))
        .and_then(|window| now.checked_sub_signed(window));

    let topics = aggregate(
        history,
        since,
        &config.schedule.thresholds,
        config.score_view,
    );
    log::debug!(
        "scheduling {} topics from {} attempts",
        topics.len(),
        history.len()
    );

    rank(topics, &config.schedule, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MasteryStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn pass_ranks_weak_first() {
        let history = vec![
            AttemptRecord::quiz("ch-1", "Cells", "Biology", now() - Duration::days(3), 9, 10),
            AttemptRecord::quiz("ch-2", "Tissues", "Biology", now() - Duration::days(3), 2, 10),
        ];
        let ranked = scheduling_pass(&history, &AppConfig::default(), now());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].aggregate.topic_name, "Tissues");
        assert_eq!(ranked[0].aggregate.status, MasteryStatus::Weak);
    }

    #[test]
    fn window_drops_old_history() {
        let history = vec![
            AttemptRecord::quiz("ch-1", "Cells", "Biology", now() - Duration::days(30), 9, 10),
            AttemptRecord::quiz("ch-2", "Tissues", "Biology", now() - Duration::days(2), 2, 10),
        ];
        let config = AppConfig {
            history_window_days: Some(7),
            ..AppConfig::default()
        };
        let ranked = scheduling_pass(&history, &config, now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].aggregate.topic_name, "Tissues");
    }

    #[test]
    fn out_of_range_config_does_not_panic() {
        let history = vec![AttemptRecord::quiz(
            "ch-2",
            "Tissues",
            "Biology",
            now() - Duration::days(2),
            2,
            10,
        )];
        let mut config = AppConfig {
            history_window_days: Some(i64::MAX),
            ..AppConfig::default()
        };
        config.schedule.intervals.weak.note_review_secs = i64::MAX / 2;

        let ranked = scheduling_pass(&history, &config, now());
        assert_eq!(ranked.len(), 1);
        let due = ranked[0].schedule.next_note_review_due.unwrap();
        assert!(due > now() + Duration::days(365 * 99));
    }

    #[test]
    fn empty_history_is_nothing_due() {
        assert!(scheduling_pass(&[], &AppConfig::default(), now()).is_empty());
    }
}
