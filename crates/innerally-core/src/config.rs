//! Runtime settings, read from flags or the environment through clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::ids::AssistantId;
use crate::security::ApiKey;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ASSISTANT_ID: &str = "ASSISTANT_ID";
pub const ENV_API_BASE: &str = "INNERALLY_API_BASE";
pub const ENV_DB_PATH: &str = "INNERALLY_DB_PATH";
pub const ENV_POLL_INTERVAL_MS: &str = "INNERALLY_POLL_INTERVAL_MS";
pub const ENV_POLL_TIMEOUT_SECS: &str = "INNERALLY_POLL_TIMEOUT_SECS";
pub const ENV_TREND_DAYS: &str = "INNERALLY_TREND_DAYS";
pub const ENV_HEALING_MAP_LIMIT: &str = "INNERALLY_HEALING_MAP_LIMIT";
pub const ENV_LOG_LEVEL: &str = "INNERALLY_LOG_LEVEL";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS);
pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const DEFAULT_HEALING_MAP_LIMIT: u32 = 50;
/// Quiet by default so log lines stay out of the chat prompt.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {detail}")]
    Invalid { name: &'static str, detail: String },
}

/// Settings as parsed, before validation. Every flag falls back to its
/// environment variable, then to the default.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// API key for the assistant service
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Assistant to run conversations against
    #[arg(long, env = ENV_ASSISTANT_ID)]
    pub assistant_id: Option<String>,

    /// Base URL of the assistant API
    #[arg(long, env = ENV_API_BASE, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// SQLite database file [default: ~/.innerally/journal.db]
    #[arg(long, env = ENV_DB_PATH)]
    pub db_path: Option<PathBuf>,

    /// Delay between run status checks, in milliseconds
    #[arg(long, env = ENV_POLL_INTERVAL_MS, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Give up on a run after this many seconds
    #[arg(long, env = ENV_POLL_TIMEOUT_SECS, default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
    pub poll_timeout_secs: u64,

    /// Trailing window for the mood trend, in days
    #[arg(long, env = ENV_TREND_DAYS, default_value_t = DEFAULT_TREND_DAYS)]
    pub trend_days: u32,

    /// How many recent healing entries feed the healing map
    #[arg(long, env = ENV_HEALING_MAP_LIMIT, default_value_t = DEFAULT_HEALING_MAP_LIMIT)]
    pub healing_map_limit: u32,

    /// Log filter (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, env = ENV_LOG_LEVEL, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

/// Everything the application needs from its environment, validated.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_key: ApiKey,
    pub assistant_id: AssistantId,
    pub api_base: String,
    pub db_path: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub trend_days: u32,
    pub healing_map_limit: u32,
    pub log_level: String,
}

impl TryFrom<ConfigArgs> for AppConfig {
    type Error = ConfigError;

    /// Checks what clap cannot: required values that are blank, the URL
    /// scheme, and the poll interval against the timeout.
    fn try_from(args: ConfigArgs) -> Result<Self, ConfigError> {
        let present = |v: Option<String>| v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = present(args.api_key).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let assistant_id = present(args.assistant_id).ok_or(ConfigError::Missing(ENV_ASSISTANT_ID))?;

        let api_base = args.api_base.trim().trim_end_matches('/').to_string();
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: ENV_API_BASE,
                detail: format!("expected an http(s) URL, got {api_base}"),
            });
        }

        let poll_interval = Duration::from_millis(args.poll_interval_ms);
        let poll_timeout = Duration::from_secs(args.poll_timeout_secs);
        if poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: ENV_POLL_INTERVAL_MS,
                detail: "must be greater than zero".into(),
            });
        }
        if poll_timeout < poll_interval {
            return Err(ConfigError::Invalid {
                name: ENV_POLL_TIMEOUT_SECS,
                detail: "must be at least one poll interval".into(),
            });
        }

        let log_level = present(Some(args.log_level)).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            api_key: ApiKey::new(api_key),
            assistant_id: AssistantId::from_raw(assistant_id),
            api_base,
            db_path: args.db_path.unwrap_or_else(default_db_path),
            poll_interval,
            poll_timeout,
            trend_days: args.trend_days,
            healing_map_limit: args.healing_map_limit,
            log_level,
        })
    }
}

/// `~/.innerally`, falling back to `/tmp` when HOME is unset.
pub fn innerally_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".innerally")
}

fn default_db_path() -> PathBuf {
    innerally_home().join("journal.db")
}
