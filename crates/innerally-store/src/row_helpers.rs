use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a stored RFC 3339 timestamp. Other layouts are rewritten when the
/// schema is initialized, so anything else here is a corrupt row.
pub fn parse_timestamp(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp {raw:?}: {e}"),
        })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use innerally_core::validation::CopingTool;

    #[test]
    fn timestamp_rfc3339_with_millis() {
        let ts = parse_timestamp("2026-03-01T08:15:30.250Z", "journal", "timestamp").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2026, 3, 1));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (8, 15, 30));
    }

    #[test]
    fn timestamp_space_separated_layout_rejected() {
        let result = parse_timestamp("2026-03-01 23:59:59", "checkins", "timestamp");
        assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
    }

    #[test]
    fn timestamp_garbage_is_corrupt_row() {
        let result = parse_timestamp("yesterday", "checkins", "timestamp");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "checkins", column: "timestamp", .. })
        ));
    }

    #[test]
    fn parse_enum_success() {
        let tool: CopingTool = parse_enum("Rest", "healing_entries", "tools").unwrap();
        assert_eq!(tool, CopingTool::Rest);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<CopingTool, _> = parse_enum("Screaming", "healing_entries", "tools");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "healing_entries", column: "tools", .. })
        ));
    }
}
