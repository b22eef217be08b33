use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use innerally_core::labels;
use innerally_core::validation::{CopingTool, Intensity, NewHealingEntry};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub intensity: Intensity,
    /// Soft references to the profile's trigger phrases; not enforced.
    pub triggers: Vec<String>,
    pub tools: Vec<CopingTool>,
}

pub struct HealingRepo {
    db: Database,
}

impl HealingRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, entry), fields(intensity = entry.intensity().value()))]
    pub fn insert(&self, entry: &NewHealingEntry) -> Result<HealingEntry, StoreError> {
        let tool_labels: Vec<&str> = entry.tools().iter().map(CopingTool::label).collect();
        self.db.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO healing_entries (emotional_intensity, triggers, tools)
                 VALUES (?1, ?2, ?3)
                 RETURNING id, timestamp, emotional_intensity, triggers, tools",
                rusqlite::params![
                    entry.intensity().value(),
                    labels::join(entry.triggers()),
                    labels::join(&tool_labels),
                ],
                |row| Ok(row_to_entry(row)),
            )?
        })
    }

    /// The `limit` most recent entries, newest first.
    #[instrument(skip(self))]
    pub fn list_recent(&self, limit: u32) -> Result<Vec<HealingEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, emotional_intensity, triggers, tools
                 FROM healing_entries ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<HealingEntry, StoreError> {
    let raw_ts: String = row_helpers::get(row, 1, "healing_entries", "timestamp")?;
    let raw_intensity: i64 = row_helpers::get(row, 2, "healing_entries", "emotional_intensity")?;
    let raw_triggers: String = row_helpers::get(row, 3, "healing_entries", "triggers")?;
    let raw_tools: String = row_helpers::get(row, 4, "healing_entries", "tools")?;

    let intensity = Intensity::new(raw_intensity).map_err(|e| StoreError::CorruptRow {
        table: "healing_entries",
        column: "emotional_intensity",
        detail: e.to_string(),
    })?;
    let tools = labels::split(&raw_tools)
        .iter()
        .map(|label| row_helpers::parse_enum(label, "healing_entries", "tools"))
        .collect::<Result<Vec<CopingTool>, _>>()?;

    Ok(HealingEntry {
        id: row_helpers::get(row, 0, "healing_entries", "id")?,
        timestamp: row_helpers::parse_timestamp(&raw_ts, "healing_entries", "timestamp")?,
        intensity,
        triggers: labels::split(&raw_triggers),
        tools,
    })
}
