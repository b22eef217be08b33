use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use innerally_core::validation::JournalText;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub entry: String,
    pub timestamp: DateTime<Utc>,
}

pub struct JournalRepo {
    db: Database,
}

impl JournalRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a journal entry; the timestamp is assigned by the database.
    #[instrument(skip(self, text), fields(len = text.as_str().len()))]
    pub fn insert(&self, text: &JournalText) -> Result<JournalEntry, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO journal (entry) VALUES (?1) RETURNING id, entry, timestamp",
                [text.as_str()],
                |row| Ok(row_to_entry(row)),
            )?
        })
    }

    /// All entries, newest first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entry, timestamp FROM journal ORDER BY timestamp DESC, id DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<JournalEntry, StoreError> {
    let raw_ts: String = row_helpers::get(row, 2, "journal", "timestamp")?;
    Ok(JournalEntry {
        id: row_helpers::get(row, 0, "journal", "id")?,
        entry: row_helpers::get(row, 1, "journal", "entry")?,
        timestamp: row_helpers::parse_timestamp(&raw_ts, "journal", "timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> JournalRepo {
        JournalRepo::new(Database::in_memory().unwrap())
    }

    fn text(s: &str) -> JournalText {
        JournalText::parse(s).unwrap()
    }

    #[test]
    fn insert_returns_id_and_timestamp() {
        let repo = repo();
        let before = Utc::now() - chrono::Duration::seconds(1);
        let entry = repo.insert(&text("Walked by the river.")).unwrap();
        assert!(entry.id > 0);
        assert_eq!(entry.entry, "Walked by the river.");
        assert!(entry.timestamp >= before);
    }

    #[test]
    fn newest_entry_listed_first() {
        let repo = repo();
        repo.insert(&text("first")).unwrap();
        repo.insert(&text("second")).unwrap();
        let latest = repo.insert(&text("I feel calmer today")).unwrap();

        let all = repo.list().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], latest);
        assert_eq!(all[2].entry, "first");
    }

    #[test]
    fn list_orders_by_timestamp_not_insertion() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO journal (entry, timestamp) VALUES ('later', '2026-05-02T10:00:00.000Z')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO journal (entry, timestamp) VALUES ('earlier', '2026-05-01T10:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let all = repo.list().unwrap();
        assert_eq!(all[0].entry, "later");
        assert_eq!(all[1].entry, "earlier");
    }

    #[test]
    fn empty_list() {
        assert!(repo().list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_timestamp_surfaces_as_error() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute("INSERT INTO journal (entry, timestamp) VALUES ('x', 'not-a-time')", [])?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(repo.list(), Err(StoreError::CorruptRow { table: "journal", .. })));
    }
}
