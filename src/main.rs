mod config;
mod content;
mod db;
mod engine;
mod error;
mod models;
mod session;
mod tui;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::{get_config_path, get_db_path, AppConfig};
use db::Database;
use models::{
    AttemptKind, AttemptRecord, BreakdownEntry, ChapterBundle, JsonOutput, MasteryStatus,
};
use session::SessionMode;

#[derive(Parser)]
#[command(name = "revhub")]
#[command(about = "Track topic mastery and run spaced-repetition review sessions")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Learner whose history to use (defaults to the configured profile)
    #[arg(long, global = true)]
    learner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a quiz or note-review attempt by hand
    Record {
        /// Chapter the attempt belongs to
        #[arg(long, short)]
        owner: String,

        /// Chapter title
        #[arg(long, short)]
        title: String,

        /// Subject name
        #[arg(long, short)]
        subject: String,

        /// Attempt kind: quiz/notes
        #[arg(long, short, default_value = "quiz")]
        kind: String,

        /// Questions answered correctly
        #[arg(long, short, default_value_t = 0)]
        correct: u32,

        /// Questions asked
        #[arg(long = "total", short = 'n', default_value_t = 0)]
        total: u32,

        /// Sub-topic inside the chapter
        #[arg(long)]
        topic: Option<String>,

        /// When it happened (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show attempt history
    History {
        /// Only the most recent N attempts
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// List topic mastery
    Topics {
        /// Filter by status: weak/average/strong/excellent
        #[arg(long, short)]
        status: Option<String>,
    },

    /// Show topics due now, highest priority first
    Due {
        /// Maximum topics to show
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Group upcoming reviews by week
    Weekly,

    /// Suggest a study plan for the weakest topics
    Plan,

    /// Topics whose notes were reviewed today
    Today,

    /// Show learning statistics
    Stats,

    /// Manage cached chapter content
    #[command(subcommand)]
    Content(ContentCommands),

    /// List missing-content reports
    Demand,

    /// Start an interactive review session
    Session {
        /// Session mode: quiz/notes
        #[arg(long, short, default_value = "quiz")]
        mode: String,

        /// Take over a session left open elsewhere
        #[arg(long)]
        force: bool,

        /// Seed for question order
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the effective configuration
    Config,

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum ContentCommands {
    /// Import a chapter bundle from a JSON file
    Import {
        /// Bundle file
        file: PathBuf,

        /// Subject name
        #[arg(long, short)]
        subject: String,

        /// Chapter the bundle belongs to
        #[arg(long, short)]
        owner: String,
    },

    /// List cached bundle keys
    List,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = get_config_path();
    let config = AppConfig::load_or_default(&config_path)?;
    let learner = cli
        .learner
        .clone()
        .unwrap_or_else(|| config.profile.learner.clone());

    let db_path = get_db_path();
    let db = Database::open(&db_path)?;
    db.init()?;

    let now = Utc::now();

    match cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Record {
            owner,
            title,
            subject,
            kind,
            correct,
            total,
            topic,
            at,
        } => {
            let kind = AttemptKind::from_str(&kind).ok_or("Invalid kind. Use: quiz/notes")?;
            let timestamp = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc),
                None => now,
            };

            let mut record = match kind {
                AttemptKind::Quiz => {
                    AttemptRecord::quiz(&owner, &title, &subject, timestamp, correct, total)
                }
                AttemptKind::NoteReview => {
                    AttemptRecord::note_review(&owner, &title, &subject, timestamp)
                }
            };
            if let Some(name) = topic {
                let entry = BreakdownEntry {
                    name,
                    status: None,
                    percent: record.percent(),
                    total: record.total_questions,
                    correct: record.correct_count,
                };
                record = record.with_breakdown(vec![entry]);
            }

            db.append_attempt(&learner, &record)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&record))?);
            } else {
                println!(
                    "Recorded {} for '{}' ({})",
                    kind.label().to_lowercase(),
                    title,
                    record.id
                );
            }
        }

        Commands::History { limit } => {
            let mut history = db.list_attempts(&learner)?;
            if let Some(limit) = limit {
                let skip = history.len().saturating_sub(limit);
                history = history.split_off(skip);
            }

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&history))?);
            } else if history.is_empty() {
                println!("No attempts recorded.");
            } else {
                println!("{:<17} {:<7} {:<32} {:<14} SCORE", "WHEN", "KIND", "TITLE", "SUBJECT");
                println!("{}", "-".repeat(80));
                for record in &history {
                    let score = match record.kind {
                        AttemptKind::Quiz => format!(
                            "{}/{} ({:.0}%)",
                            record.correct_count,
                            record.total_questions,
                            record.percent()
                        ),
                        AttemptKind::NoteReview => "-".to_string(),
                    };
                    println!(
                        "{:<17} {:<7} {:<32} {:<14} {}",
                        record.timestamp.format("%Y-%m-%d %H:%M"),
                        record.kind.label(),
                        truncate(&record.display_title, 30),
                        truncate(&record.subject_name, 12),
                        score
                    );
                }
            }
        }

        Commands::Topics { status } => {
            let status_filter = match status {
                Some(s) => Some(
                    MasteryStatus::from_str(&s)
                        .ok_or("Invalid status. Use: weak/average/strong/excellent")?,
                ),
                None => None,
            };

            let ranked: Vec<_> = engine::scheduling_pass(&db.list_attempts(&learner)?, &config, now)
                .into_iter()
                .filter(|r| status_filter.map_or(true, |s| r.aggregate.status == s))
                .collect();

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&ranked))?);
            } else if ranked.is_empty() {
                println!("No topics tracked yet.");
            } else {
                println!(
                    "{:<30} {:<10} {:>6} {:>6} {:<6} NEXT",
                    "TOPIC", "STATUS", "ACC%", "STREAK", "ACTION"
                );
                println!("{}", "-".repeat(80));
                for r in &ranked {
                    let (action, due) = describe_next(r);
                    println!(
                        "{:<30} {:<10} {:>6.0} {:>6} {:<6} {}",
                        truncate(&r.aggregate.topic_name, 28),
                        r.aggregate.status.as_str(),
                        r.aggregate.accuracy_percent,
                        r.aggregate.mastery_streak,
                        action,
                        due
                    );
                }
            }
        }

        Commands::Due { limit } => {
            let ranked = engine::scheduling_pass(&db.list_attempts(&learner)?, &config, now);
            let due: Vec<_> = engine::due_queue(&ranked, now)
                .into_iter()
                .take(limit)
                .collect();

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("Nothing due. Come back later.");
            } else {
                println!(
                    "{:<4} {:<30} {:<10} {:>8} {:>8} ACTION",
                    "#", "TOPIC", "STATUS", "SCORE", "OVERDUE"
                );
                println!("{}", "-".repeat(75));
                for (i, r) in due.iter().enumerate() {
                    let (action, _) = describe_next(r);
                    println!(
                        "{:<4} {:<30} {:<10} {:>8.0} {:>7.1}d {}",
                        i + 1,
                        truncate(&r.aggregate.topic_name, 28),
                        r.aggregate.status.as_str(),
                        r.score,
                        r.days_overdue,
                        action
                    );
                }
            }
        }

        Commands::Weekly => {
            let ranked = engine::scheduling_pass(&db.list_attempts(&learner)?, &config, now);
            let weeks = engine::weekly_breakdown(&ranked, now);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&weeks))?);
            } else if weeks.is_empty() {
                println!("No topics scheduled.");
            } else {
                for week in &weeks {
                    println!("=== {} ===", week.label);
                    for r in &week.topics {
                        let (action, due) = describe_next(r);
                        println!(
                            "  {:<30} {:<10} {:<6} {}",
                            truncate(&r.aggregate.topic_name, 28),
                            r.aggregate.status.as_str(),
                            action,
                            due
                        );
                    }
                }
            }
        }

        Commands::Plan => {
            let ranked = engine::scheduling_pass(&db.list_attempts(&learner)?, &config, now);
            let topics: Vec<_> = ranked.into_iter().map(|r| r.aggregate).collect();
            let plan = engine::study_plan(&topics);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&plan))?);
            } else if plan.is_empty() {
                println!("No weak topics. Nice work.");
            } else {
                println!("=== Study Plan ===");
                for (i, step) in plan.iter().enumerate() {
                    println!(
                        "{}. {} ({}, {:.0}%)",
                        i + 1,
                        step.topic_name,
                        step.subject_name,
                        step.accuracy_percent
                    );
                    println!("   {}", step.suggestion);
                }
            }
        }

        Commands::Today => {
            let done = engine::completed_today(&db.list_attempts(&learner)?, now);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&done))?);
            } else if done.is_empty() {
                println!("No notes reviewed today.");
            } else {
                for item in &done {
                    println!(
                        "{}  {} ({})",
                        item.reviewed_at.format("%H:%M"),
                        item.topic_name,
                        item.subject_name
                    );
                }
            }
        }

        Commands::Stats => {
            let history = db.list_attempts(&learner)?;
            let ranked = engine::scheduling_pass(&history, &config, now);
            let stats = engine::stats(&history, &ranked, now);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Learning Statistics ===");
                println!("Attempts: {} ({} quizzes, {} note reviews)", stats.total_attempts, stats.quiz_attempts, stats.note_reviews);
                println!("Topics tracked: {}", stats.tracked_topics);
                println!(
                    "Weak / Average / Strong / Excellent: {} / {} / {} / {}",
                    stats.weak, stats.average, stats.strong, stats.excellent
                );
                println!("Due now: {}", stats.due_now);
            }
        }

        Commands::Content(content_cmd) => match content_cmd {
            ContentCommands::Import {
                file,
                subject,
                owner,
            } => {
                let raw = std::fs::read_to_string(&file)?;
                let bundle: ChapterBundle = serde_json::from_str(&raw)?;
                let request = content::ContentRequest {
                    topic_owner_id: owner.clone(),
                    topic_name: String::new(),
                    display_title: String::new(),
                    subject_name: subject,
                    board: config.profile.board.clone(),
                    level: config.profile.level.clone(),
                    stream: config.profile.stream.clone(),
                };
                let key = request.precise_key();
                db.store_bundle(&key, &bundle)?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "key": key,
                            "notes": bundle.notes.len(),
                            "questions": bundle.questions.len()
                        })))?
                    );
                } else {
                    println!(
                        "Imported {} questions and {} notes as {}",
                        bundle.questions.len(),
                        bundle.notes.len(),
                        key
                    );
                }
            }

            ContentCommands::List => {
                let keys = db.list_bundle_keys()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&keys))?);
                } else if keys.is_empty() {
                    println!("No content cached.");
                } else {
                    for key in keys {
                        println!("{}", key);
                    }
                }
            }
        },

        Commands::Demand => {
            let reports = db.list_demand()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&reports))?);
            } else if reports.is_empty() {
                println!("No missing content reported.");
            } else {
                println!("{:<5} {:<20} {:<30} REPORTED", "ID", "OWNER", "TOPIC");
                println!("{}", "-".repeat(80));
                for r in reports {
                    println!(
                        "{:<5} {:<20} {:<30} {}",
                        r.id,
                        truncate(&r.topic_owner_id, 18),
                        truncate(&r.topic_name, 28),
                        r.reported_at
                    );
                }
            }
        }

        Commands::Session { mode, force, seed } => {
            let mode = SessionMode::from_str(&mode).ok_or("Invalid mode. Use: quiz/notes")?;
            let seed = seed.unwrap_or_else(rand::random);
            let results = tui::run_review(&db, &config, &learner, mode, force, seed)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&results))?);
            } else if results.is_empty() {
                println!("Session ended with no topics completed.");
            } else {
                println!("=== Session Summary ===");
                for r in &results {
                    println!(
                        "{:<30} {}/{} ({:.0}%) {}",
                        truncate(&r.topic_name, 28),
                        r.correct,
                        r.total,
                        r.percent,
                        r.status.label()
                    );
                }
            }
        }

        Commands::Config => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&config))?);
            } else {
                println!("# {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }

        Commands::Tui => {
            tui::run(db, config, learner)?;
        }
    }

    Ok(())
}

fn describe_next(r: &engine::RankedTopic) -> (&'static str, String) {
    let action = r.next_action().map_or("any", |kind| kind.label());
    let due = r
        .schedule
        .due_at()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "now".to_string());
    (action, due)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
