use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ScoreView;

const APP_DIR: &str = "revhub";
const DEFAULT_DB_NAME: &str = "revhub.db";
const DEFAULT_CONFIG_NAME: &str = "config.json";

const DAY_SECS: i64 = 24 * 60 * 60;

/// Longest interval or delay the scheduler will ever produce (100 years).
pub const MAX_INTERVAL_SECS: i64 = 100 * 365 * DAY_SECS;
/// Longest history window, in days.
pub const MAX_WINDOW_DAYS: i64 = 100 * 365;
const MAX_DELAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Percent boundaries: below `weak` is WEAK, below `average` is AVERAGE,
/// below `mastery` is STRONG, anything else EXCELLENT. A quiz scoring at or
/// above `mastery` extends the mastery streak; one below `weak` resets it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub weak: f64,
    pub average: f64,
    pub mastery: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            weak: 50.0,
            average: 65.0,
            mastery: 80.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let ordered = self.weak < self.average && self.average < self.mastery;
        if !ordered || self.mastery > 100.0 || self.weak < 0.0 {
            return Err(Error::Config(format!(
                "thresholds must satisfy 0 <= weak < average < mastery <= 100 (got {}/{}/{})",
                self.weak, self.average, self.mastery
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPair {
    pub note_review_secs: i64,
    pub quiz_secs: i64,
}

impl IntervalPair {
    pub fn days(note_review: i64, quiz: i64) -> Self {
        Self {
            note_review_secs: note_review * DAY_SECS,
            quiz_secs: quiz * DAY_SECS,
        }
    }

    pub fn note_review(&self) -> Duration {
        Duration::seconds(self.note_review_secs.clamp(0, MAX_INTERVAL_SECS))
    }

    pub fn quiz(&self) -> Duration {
        Duration::seconds(self.quiz_secs.clamp(0, MAX_INTERVAL_SECS))
    }
}

// Base intervals per status band; STRONG and EXCELLENT share `strong`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalTable {
    pub weak: IntervalPair,
    pub average: IntervalPair,
    pub strong: IntervalPair,
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            weak: IntervalPair::days(1, 3),
            average: IntervalPair::days(3, 5),
            strong: IntervalPair::days(7, 10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankWeights {
    pub accuracy: f64,
    pub overdue_per_day: f64,
    pub weak_bonus: f64,
    pub average_bonus: f64,
    pub strong_bonus: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            accuracy: 2.0,
            overdue_per_day: 10.0,
            weak_bonus: 500.0,
            average_bonus: 200.0,
            strong_bonus: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub max_questions: usize,
    pub read_dwell_secs: i64,
    pub advance_delay_ms: i64,
    pub summary_delay_ms: i64,
    pub queue_limit: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_questions: 20,
            read_dwell_secs: 10,
            advance_delay_ms: 500,
            summary_delay_ms: 1500,
            queue_limit: 10,
        }
    }
}

impl SessionSettings {
    pub fn read_dwell(&self) -> Duration {
        Duration::seconds(self.read_dwell_secs.clamp(0, MAX_DELAY_MS / 1000))
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::milliseconds(self.advance_delay_ms.clamp(0, MAX_DELAY_MS))
    }

    pub fn summary_delay(&self) -> Duration {
        Duration::milliseconds(self.summary_delay_ms.clamp(0, MAX_DELAY_MS))
    }
}

/// Everything the scheduling engine and the session orchestrator read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub thresholds: Thresholds,
    pub intervals: IntervalTable,
    pub backoff_factor: f64,
    pub weights: RankWeights,
    pub session: SessionSettings,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            intervals: IntervalTable::default(),
            backoff_factor: 1.5,
            weights: RankWeights::default(),
            session: SessionSettings::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        let table = &self.intervals;
        for (band, pair) in [
            ("weak", table.weak),
            ("average", table.average),
            ("strong", table.strong),
        ] {
            if pair.note_review_secs <= 0 || pair.quiz_secs <= 0 {
                return Err(Error::Config(format!(
                    "intervals.{} must be positive",
                    band
                )));
            }
            if pair.note_review_secs > MAX_INTERVAL_SECS || pair.quiz_secs > MAX_INTERVAL_SECS {
                return Err(Error::Config(format!(
                    "intervals.{} must be at most {} seconds",
                    band, MAX_INTERVAL_SECS
                )));
            }
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Config(format!(
                "backoff_factor must be >= 1.0 (got {})",
                self.backoff_factor
            )));
        }

        let session = &self.session;
        if session.max_questions == 0 {
            return Err(Error::Config("session.max_questions must be > 0".into()));
        }
        if session.read_dwell_secs < 0 || session.advance_delay_ms < 0 || session.summary_delay_ms < 0
        {
            return Err(Error::Config("session delays must not be negative".into()));
        }
        if session.read_dwell_secs > MAX_DELAY_MS / 1000
            || session.advance_delay_ms > MAX_DELAY_MS
            || session.summary_delay_ms > MAX_DELAY_MS
        {
            return Err(Error::Config("session delays must be at most one day".into()));
        }

        Ok(())
    }
}

// Where the learner's content lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub learner: String,
    pub board: String,
    pub level: String,
    pub stream: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            learner: "default".to_string(),
            board: "CBSE".to_string(),
            level: "10".to_string(),
            stream: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profile: Profile,
    pub schedule: ScheduleConfig,
    pub score_view: ScoreView,
    pub history_window_days: Option<i64>,
    pub content_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            schedule: ScheduleConfig::default(),
            score_view: ScoreView::Latest,
            history_window_days: None,
            content_dir: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;
        if self.profile.learner.trim().is_empty() {
            return Err(Error::Config("profile.learner must not be empty".into()));
        }
        if let Some(days) = self.history_window_days {
            if days <= 0 || days > MAX_WINDOW_DAYS {
                return Err(Error::Config(format!(
                    "history_window_days must be between 1 and {}",
                    MAX_WINDOW_DAYS
                )));
            }
        }
        Ok(())
    }
}

fn app_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);

    fs::create_dir_all(&dir).ok();
    dir
}

pub fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("REVHUB_DB") {
        return PathBuf::from(path);
    }
    app_dir().join(DEFAULT_DB_NAME)
}

pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("REVHUB_CONFIG") {
        return PathBuf::from(path);
    }
    app_dir().join(DEFAULT_CONFIG_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod threshold_tests {
        use super::*;

        #[test]
        fn defaults_are_valid() {
            assert!(Thresholds::default().validate().is_ok());
        }

        #[test]
        fn rejects_unordered() {
            let t = Thresholds {
                weak: 70.0,
                average: 65.0,
                mastery: 80.0,
            };
            assert!(t.validate().is_err());
        }

        #[test]
        fn rejects_mastery_above_100() {
            let t = Thresholds {
                weak: 50.0,
                average: 65.0,
                mastery: 101.0,
            };
            assert!(t.validate().is_err());
        }

        #[test]
        fn accepts_mastery_of_exactly_100() {
            let t = Thresholds {
                weak: 50.0,
                average: 65.0,
                mastery: 100.0,
            };
            assert!(t.validate().is_ok());
        }
    }

    mod schedule_config_tests {
        use super::*;

        #[test]
        fn default_intervals_in_days() {
            let table = IntervalTable::default();
            assert_eq!(table.weak.note_review(), Duration::days(1));
            assert_eq!(table.weak.quiz(), Duration::days(3));
            assert_eq!(table.average.note_review(), Duration::days(3));
            assert_eq!(table.average.quiz(), Duration::days(5));
            assert_eq!(table.strong.note_review(), Duration::days(7));
            assert_eq!(table.strong.quiz(), Duration::days(10));
        }

        #[test]
        fn rejects_non_positive_interval() {
            let mut config = ScheduleConfig::default();
            config.intervals.average.quiz_secs = 0;
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_shrinking_backoff() {
            let config = ScheduleConfig {
                backoff_factor: 0.9,
                ..ScheduleConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_interval_beyond_cap() {
            let mut config = ScheduleConfig::default();
            config.intervals.weak.note_review_secs = i64::MAX / 2;
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_day_long_delays() {
            let mut config = ScheduleConfig::default();
            config.session.summary_delay_ms = i64::MAX;
            assert!(config.validate().is_err());
        }

        #[test]
        fn huge_values_clamp_instead_of_overflowing() {
            let pair = IntervalPair {
                note_review_secs: i64::MAX,
                quiz_secs: -5,
            };
            assert_eq!(pair.note_review(), Duration::seconds(MAX_INTERVAL_SECS));
            assert_eq!(pair.quiz(), Duration::zero());

            let session = SessionSettings {
                read_dwell_secs: i64::MAX,
                advance_delay_ms: i64::MAX,
                ..SessionSettings::default()
            };
            assert_eq!(session.read_dwell(), Duration::days(1));
            assert_eq!(session.advance_delay(), Duration::days(1));
        }

        #[test]
        fn rejects_zero_question_cap() {
            let mut config = ScheduleConfig::default();
            config.session.max_questions = 0;
            assert!(config.validate().is_err());
        }
    }

    mod app_config_tests {
        use super::*;

        #[test]
        fn partial_json_fills_defaults() {
            let raw = r#"{ "schedule": { "thresholds": { "mastery": 90 } }, "profile": { "learner": "asha" } }"#;
            let config: AppConfig = serde_json::from_str(raw).unwrap();
            assert_eq!(config.schedule.thresholds.mastery, 90.0);
            assert_eq!(config.schedule.thresholds.weak, 50.0);
            assert_eq!(config.profile.learner, "asha");
            assert_eq!(config.profile.board, "CBSE");
            assert_eq!(config.schedule.session.max_questions, 20);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn score_view_parses_snake_case() {
            let raw = r#"{ "score_view": "all_time" }"#;
            let config: AppConfig = serde_json::from_str(raw).unwrap();
            assert_eq!(config.score_view, ScoreView::AllTime);
        }

        #[test]
        fn rejects_empty_learner() {
            let mut config = AppConfig::default();
            config.profile.learner = "  ".into();
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_zero_window() {
            let config = AppConfig {
                history_window_days: Some(0),
                ..AppConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_window_beyond_cap() {
            let config = AppConfig {
                history_window_days: Some(i64::MAX),
                ..AppConfig::default()
            };
            assert!(config.validate().is_err());

            let config = AppConfig {
                history_window_days: Some(MAX_WINDOW_DAYS),
                ..AppConfig::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn missing_file_gives_defaults() {
            let path = std::env::temp_dir().join("revhub-config-that-does-not-exist.json");
            let config = AppConfig::load_or_default(&path).unwrap();
            assert_eq!(config, AppConfig::default());
        }
    }
}
