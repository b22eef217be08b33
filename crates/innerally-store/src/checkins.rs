use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use innerally_core::validation::MoodLabel;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: i64,
    pub mood: String,
    pub timestamp: DateTime<Utc>,
}

pub struct CheckInRepo {
    db: Database,
}

impl CheckInRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a mood check-in. Repeated moods are stored as distinct rows.
    #[instrument(skip(self, mood), fields(mood = mood.as_str()))]
    pub fn insert(&self, mood: &MoodLabel) -> Result<CheckIn, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO checkins (mood) VALUES (?1) RETURNING id, mood, timestamp",
                [mood.as_str()],
                |row| Ok(row_to_checkin(row)),
            )?
        })
    }

    /// All check-ins, oldest first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<CheckIn>, StoreError> {
        self.query(
            "SELECT id, mood, timestamp FROM checkins ORDER BY timestamp ASC, id ASC",
            rusqlite::params![],
        )
    }

    /// Check-ins at or after `since`, oldest first.
    #[instrument(skip(self))]
    pub fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<CheckIn>, StoreError> {
        // Stored timestamps share this layout, so text comparison orders correctly.
        let bound = since.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        self.query(
            "SELECT id, mood, timestamp FROM checkins WHERE timestamp >= ?1
             ORDER BY timestamp ASC, id ASC",
            rusqlite::params![bound],
        )
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<CheckIn>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params)?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_checkin(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_checkin(row: &rusqlite::Row<'_>) -> Result<CheckIn, StoreError> {
    let raw_ts: String = row_helpers::get(row, 2, "checkins", "timestamp")?;
    Ok(CheckIn {
        id: row_helpers::get(row, 0, "checkins", "id")?,
        mood: row_helpers::get(row, 1, "checkins", "mood")?,
        timestamp: row_helpers::parse_timestamp(&raw_ts, "checkins", "timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repo() -> CheckInRepo {
        CheckInRepo::new(Database::in_memory().unwrap())
    }

    fn mood(s: &str) -> MoodLabel {
        MoodLabel::parse(s).unwrap()
    }

    #[test]
    fn same_mood_twice_is_not_deduplicated() {
        let repo = repo();
        let a = repo.insert(&mood("😊 Happy")).unwrap();
        let b = repo.insert(&mood("😊 Happy")).unwrap();
        assert_ne!(a.id, b.id);

        let all = repo.list().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|c| c.mood == "😊 Happy"));
        assert_eq!(all[0].timestamp.date_naive(), all[1].timestamp.date_naive());
    }

    #[test]
    fn list_is_oldest_first() {
        let repo = repo();
        repo.insert(&mood("😟 Sad")).unwrap();
        repo.insert(&mood("😐 Neutral")).unwrap();
        let all = repo.list().unwrap();
        assert_eq!(all[0].mood, "😟 Sad");
        assert_eq!(all[1].mood, "😐 Neutral");
    }

    #[test]
    fn free_text_moods_are_stored() {
        let repo = repo();
        let row = repo.insert(&mood("restless")).unwrap();
        assert_eq!(row.mood, "restless");
    }

    #[test]
    fn list_since_filters_older_rows() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO checkins (mood, timestamp) VALUES ('old', '2026-01-01T09:00:00.000Z')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO checkins (mood, timestamp) VALUES ('new', '2026-02-01T09:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let since = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let rows = repo.list_since(since).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mood, "new");
    }
}
