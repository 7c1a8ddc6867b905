use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::validation::DATE_FORMAT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    Memory,
    File(String),
}

impl From<&str> for DatabaseSource {
    fn from(value: &str) -> Self {
        match value {
            ":memory:" | "" => DatabaseSource::Memory,
            path => DatabaseSource::File(path.to_string()),
        }
    }
}

pub fn open(src: &DatabaseSource) -> rusqlite::Result<Connection> {
    let conn = match src {
        DatabaseSource::Memory => Connection::open_in_memory()?,
        DatabaseSource::File(path) => Connection::open(path.as_str())?,
    };
    // Needed for ON DELETE CASCADE on bookings.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // SQLite's own lower() only folds ASCII.
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )?;
    Ok(conn)
}

/// Substring pattern for `LIKE ... ESCAPE '\'`, lowercased to match `casefold`.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[inline]
pub fn query_wrapper(query: String) -> String {
    let mut query_final = query.replace('\n', " ");
    while query_final.contains("  ") {
        query_final = query_final.replace("  ", " ");
    }
    log::debug!("#SQL: [{}]", query_final.trim());
    query_final
}

pub fn timestamp_to_sql(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn timestamp_from_sql(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| StoreError::Timestamp { column, source })
}

pub fn date_to_sql(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn date_from_sql(column: &'static str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|source| StoreError::Timestamp { column, source })
}

pub fn decimal_from_sql(column: &'static str, value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|source| StoreError::Decimal { column, source })
}

pub fn enum_from_sql<T: FromStr>(column: &'static str, value: String) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Enum { column, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_wrapper_collapses_whitespace() {
        let q = query_wrapper("SELECT *\n    FROM   apartments\n WHERE id = ?1".to_string());
        assert_eq!(q, "SELECT * FROM apartments WHERE id = ?1");
    }

    #[test]
    fn source_from_setting() {
        assert_eq!(DatabaseSource::from(":memory:"), DatabaseSource::Memory);
        assert_eq!(
            DatabaseSource::from("rentdesk.db"),
            DatabaseSource::File("rentdesk.db".into())
        );
    }

    #[test]
    fn timestamps_survive_storage_format() {
        let now = Utc::now();
        let stored = timestamp_to_sql(&now);
        let loaded = timestamp_from_sql("created_at", &stored).unwrap();
        assert_eq!(loaded.timestamp_micros(), now.timestamp_micros());
        assert!(matches!(
            timestamp_from_sql("created_at", "yesterday"),
            Err(StoreError::Timestamp { .. })
        ));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("КВАРТИРА"), "%квартира%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn casefold_handles_cyrillic() {
        let conn = open(&DatabaseSource::Memory).unwrap();
        let folded: String = conn
            .query_row("SELECT casefold('Квартира БІЛЯ Парку')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "квартира біля парку");
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open(&DatabaseSource::Memory).unwrap();
        let on: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}
