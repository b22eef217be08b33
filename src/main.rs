mod chat;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use innerally_assistant::{OpenAiAssistantClient, ReliableAssistant};
use innerally_core::config::{innerally_home, AppConfig, ConfigArgs};
use innerally_core::validation::{CopingTool, JournalText, MoodLabel, NewHealingEntry, NewProfile, MOOD_OPTIONS};
use innerally_session::{ConversationEngine, PollPolicy, ProfileProvider};
use innerally_store::checkins::CheckInRepo;
use innerally_store::healing::HealingRepo;
use innerally_store::journal::JournalRepo;
use innerally_store::profile::OnboardingRepo;
use innerally_store::trends;
use innerally_store::Database;
use innerally_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "innerally")]
#[command(about = "Private mood, journal and healing tracker with an assistant to talk to", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save (or replace) your profile
    Onboard {
        #[arg(short, long)]
        name: String,
        /// What matters most to you
        #[arg(short = 'v', long, default_value = "")]
        values: String,
        /// Comma-separated emotional triggers
        #[arg(short, long, default_value = "")]
        triggers: String,
    },
    /// Record how you feel. Without a mood, lists the suggested options;
    /// a number picks one of them.
    Checkin { mood: Option<String> },
    /// Write a journal entry
    Journal {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Log a healing entry
    Heal {
        /// Emotional intensity, 1-10
        #[arg(short, long)]
        intensity: i64,
        /// Trigger label (repeatable)
        #[arg(short, long = "trigger")]
        triggers: Vec<String>,
        /// Coping tool (repeatable), e.g. "Breathing"
        #[arg(short = 'c', long = "tool")]
        tools: Vec<CopingTool>,
    },
    /// Show saved entries
    History {
        #[command(subcommand)]
        kind: HistoryKind,
    },
    /// Daily dominant mood over the trailing window
    Trends {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Triggers and coping tools across recent healing entries
    HealingMap {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show the saved profile
    Profile,
    /// Talk with InnerAlly. Ctrl-C ends the conversation.
    Chat,
}

#[derive(Subcommand)]
enum HistoryKind {
    Journal,
    Checkins,
    Healing {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::try_from(cli.config).context("configuration")?;

    let log_dir = config
        .db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(innerally_home);
    let _telemetry = init_telemetry(TelemetryConfig::in_dir(log_dir, config.log_level.clone()));

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    match cli.command {
        Commands::Onboard {
            name,
            values,
            triggers,
        } => {
            let profile = NewProfile::new(&name, &values, &triggers)?;
            let saved = OnboardingRepo::new(db).upsert(&profile)?;
            println!("Profile saved for {}.", saved.name);
        }
        Commands::Checkin { mood: None } => {
            for (i, option) in MOOD_OPTIONS.iter().enumerate() {
                println!("{}. {option}", i + 1);
            }
        }
        Commands::Checkin { mood: Some(raw) } => {
            let label = MoodLabel::parse(resolve_mood(&raw))?;
            let checkin = CheckInRepo::new(db).insert(&label)?;
            println!("Checked in: {} ({})", checkin.mood, checkin.timestamp.format("%Y-%m-%d %H:%M"));
        }
        Commands::Journal { text } => {
            let text = JournalText::parse(&text.join(" "))?;
            let entry = JournalRepo::new(db).insert(&text)?;
            println!("Journal entry #{} saved.", entry.id);
        }
        Commands::Heal {
            intensity,
            triggers,
            tools,
        } => {
            let entry = NewHealingEntry::new(intensity, &triggers, &tools)?;
            let saved = HealingRepo::new(db).insert(&entry)?;
            println!("Healing entry #{} saved (intensity {}).", saved.id, saved.intensity.value());
        }
        Commands::History { kind } => print_history(db, kind)?,
        Commands::Trends { days } => {
            let days = days.unwrap_or(config.trend_days);
            let since = trends::window_start(Utc::now(), days);
            let checkins = CheckInRepo::new(db).list_since(since)?;
            let points = trends::mood_trend(&checkins);
            if points.is_empty() {
                println!("No check-ins in the last {days} days.");
            }
            for point in points {
                println!("{}  {:<10} {}/{}", point.date, point.mood, point.count, point.total);
            }
        }
        Commands::HealingMap { limit } => {
            let limit = limit.unwrap_or(config.healing_map_limit);
            let entries = HealingRepo::new(db).list_recent(limit)?;
            let map = trends::healing_map(&entries);
            println!("Triggers:");
            for stat in &map.triggers {
                println!("  {:<24} {:>3} entries, mean intensity {:.1}", stat.label, stat.entries, stat.mean_intensity);
            }
            println!("Coping tools:");
            for stat in &map.tools {
                println!("  {:<24} {:>3} entries, mean intensity {:.1}", stat.label, stat.entries, stat.mean_intensity);
            }
        }
        Commands::Profile => match OnboardingRepo::new(db).get()? {
            Some(profile) => {
                println!("Name: {}", profile.name);
                println!("Core values: {}", profile.core_values);
                println!("Emotional triggers: {}", profile.trigger_list().join(", "));
            }
            None => println!("No profile yet. Run `innerally onboard` first."),
        },
        Commands::Chat => {
            let client = OpenAiAssistantClient::new(config.api_key.clone(), &config.api_base)?;
            let engine = ConversationEngine::new(
                Arc::new(ReliableAssistant::with_defaults(client)),
                ProfileProvider::new(db),
                config.assistant_id.clone(),
                PollPolicy::from_config(&config),
            );
            chat::run(&engine).await?;
        }
    }

    Ok(())
}

/// A 1-based index into the suggested moods, or the label itself.
fn resolve_mood(raw: &str) -> &str {
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| MOOD_OPTIONS.get(i).copied())
        .unwrap_or(raw)
}

fn print_history(db: Database, kind: HistoryKind) -> Result<()> {
    match kind {
        HistoryKind::Journal => {
            for entry in JournalRepo::new(db).list()? {
                println!("[{}] {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.entry);
            }
        }
        HistoryKind::Checkins => {
            for checkin in CheckInRepo::new(db).list()? {
                println!("[{}] {}", checkin.timestamp.format("%Y-%m-%d %H:%M"), checkin.mood);
            }
        }
        HistoryKind::Healing { limit } => {
            if limit == 0 {
                bail!("limit must be at least 1");
            }
            for entry in HealingRepo::new(db).list_recent(limit)? {
                let tools: Vec<&str> = entry.tools.iter().map(|t| t.label()).collect();
                println!(
                    "[{}] intensity {:>2}  triggers: {}  tools: {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.intensity.value(),
                    entry.triggers.join(", "),
                    tools.join(", ")
                );
            }
        }
    }
    Ok(())
}
