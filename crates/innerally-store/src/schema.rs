/// SQL DDL for the journal database.
/// Every statement is idempotent; there are no migrations. The version is
/// kept in `PRAGMA user_version` so the store holds exactly the four tables.
pub const SCHEMA_VERSION: u32 = 1;

pub const TABLES: [&str; 4] = ["journal", "checkins", "onboarding", "healing_entries"];

/// Timestamps are UTC RFC 3339 with milliseconds, filled in by SQLite.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS journal (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry TEXT NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS checkins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mood TEXT NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS onboarding (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    name TEXT NOT NULL,
    core_values TEXT NOT NULL,
    emotional_triggers TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS healing_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    emotional_intensity INTEGER NOT NULL,
    triggers TEXT NOT NULL,
    tools TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_timestamp ON journal(timestamp);
CREATE INDEX IF NOT EXISTS idx_checkins_timestamp ON checkins(timestamp);
CREATE INDEX IF NOT EXISTS idx_healing_timestamp ON healing_entries(timestamp);
"#;

/// Rewrites rows stored in SQLite's `CURRENT_TIMESTAMP` layout
/// (`YYYY-MM-DD HH:MM:SS`) into the RFC 3339 layout above, so text ordering
/// and range filters agree with time order. Unparseable values are left
/// alone and surface as corrupt rows when read.
pub const NORMALIZE_TIMESTAMPS: &str = r#"
UPDATE journal SET timestamp = strftime('%Y-%m-%dT%H:%M:%fZ', timestamp)
    WHERE timestamp NOT LIKE '%T%' AND strftime('%Y-%m-%dT%H:%M:%fZ', timestamp) IS NOT NULL;
UPDATE checkins SET timestamp = strftime('%Y-%m-%dT%H:%M:%fZ', timestamp)
    WHERE timestamp NOT LIKE '%T%' AND strftime('%Y-%m-%dT%H:%M:%fZ', timestamp) IS NOT NULL;
UPDATE healing_entries SET timestamp = strftime('%Y-%m-%dT%H:%M:%fZ', timestamp)
    WHERE timestamp NOT LIKE '%T%' AND strftime('%Y-%m-%dT%H:%M:%fZ', timestamp) IS NOT NULL;
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
