//! Row decoding, timestamp encoding and sqlx error mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use mnemo_core::error::StoreError;
use mnemo_core::observation::{Importance, Observation, ObservationMetadata, ObservationType};
use mnemo_core::session::{Session, SessionMetadata};
use mnemo_core::store::SearchHit;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Encode a timestamp as fixed-width RFC 3339 so text order is time order.
pub fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("{column} column: {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Storage(format!("{name} column: {e}")))
}

fn obs_type(raw: &str) -> Result<ObservationType, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Storage(format!("type column: {e}")))
}

/// Parse a `Session` from a row of `sessions`.
pub fn row_to_session(row: &SqliteRow) -> Result<Session, StoreError> {
    let started_at: String = column(row, "started_at")?;
    let ended_at: Option<String> = column(row, "ended_at")?;
    let metadata: Option<String> = column(row, "metadata")?;

    Ok(Session {
        id: column(row, "id")?,
        session_key: column(row, "session_key")?,
        project_path: column(row, "project_path")?,
        started_at: decode_ts(&started_at, "started_at")?,
        ended_at: ended_at
            .as_deref()
            .map(|raw| decode_ts(raw, "ended_at"))
            .transpose()?,
        summary: column(row, "summary")?,
        metadata: metadata.as_deref().and_then(SessionMetadata::from_stored),
    })
}

/// Parse an `Observation` from a row of `observations`.
pub fn row_to_observation(row: &SqliteRow) -> Result<Observation, StoreError> {
    let raw_type: String = column(row, "type")?;
    let created_at: String = column(row, "created_at")?;
    let importance: f64 = column(row, "importance")?;
    let metadata: Option<String> = column(row, "metadata")?;

    Ok(Observation {
        id: column(row, "id")?,
        session_id: column(row, "session_id")?,
        obs_type: obs_type(&raw_type)?,
        tool_name: column(row, "tool_name")?,
        input: column(row, "input")?,
        output: column(row, "output")?,
        summary: column(row, "summary")?,
        tokens: column(row, "tokens")?,
        importance: Importance::new(importance),
        created_at: decode_ts(&created_at, "created_at")?,
        metadata: metadata.as_deref().and_then(ObservationMetadata::from_stored),
    })
}

/// Parse a `SearchHit` from a ranked FTS row.
pub fn row_to_hit(row: &SqliteRow) -> Result<SearchHit, StoreError> {
    let raw_type: String = column(row, "type")?;
    let created_at: String = column(row, "created_at")?;
    let importance: f64 = column(row, "importance")?;

    Ok(SearchHit {
        id: column(row, "id")?,
        obs_type: obs_type(&raw_type)?,
        tool_name: column(row, "tool_name")?,
        summary: column(row, "summary")?,
        created_at: decode_ts(&created_at, "created_at")?,
        importance: Importance::new(importance),
        rank: column(row, "rank")?,
    })
}

/// SQLite result codes meaning the database could not be used right now:
/// BUSY, LOCKED, IOERR, CORRUPT, FULL, CANTOPEN.
const UNAVAILABLE_CODES: &[i32] = &[5, 6, 10, 11, 13, 14];

/// Whether an SQLite (possibly extended) result code leaves the store unusable.
pub fn is_unavailable_code(code: &str) -> bool {
    code.parse::<i32>()
        .is_ok_and(|c| UNAVAILABLE_CODES.contains(&(c & 0xff)))
}

/// Whether an error message comes from FTS5 rejecting a MATCH expression.
pub fn is_query_syntax_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["fts5", "syntax error", "unterminated string", "unknown special query", "no such column"]
        .iter()
        .any(|m| message.contains(m))
}

/// Map a sqlx error onto the store's error kinds.
pub fn map_sqlx(context: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("{context}: {err}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("{context}: {e}")),
        sqlx::Error::Database(ref db) if db.code().is_some_and(|c| is_unavailable_code(&c)) => {
            StoreError::Unavailable(format!("{context}: {db}"))
        }
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            StoreError::ConstraintViolation(format!("{context}: {db}"))
        }
        sqlx::Error::Database(ref db) if db.is_check_violation() => {
            StoreError::ConstraintViolation(format!("{context}: {db}"))
        }
        other => StoreError::Storage(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 9, 5, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let a = encode_ts(&early);
        let b = encode_ts(&late);
        assert_eq!(a, "2026-01-02T09:05:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn timestamps_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 12, 30, 45).unwrap();
        assert_eq!(decode_ts(&encode_ts(&ts), "created_at").unwrap(), ts);
        assert!(decode_ts("yesterday", "created_at").is_err());
    }

    #[test]
    fn pool_errors_are_unavailable() {
        assert!(matches!(
            map_sqlx("ping", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx("select", sqlx::Error::RowNotFound),
            StoreError::Storage(_)
        ));
    }

    #[test]
    fn busy_and_io_codes_are_unavailable() {
        assert!(is_unavailable_code("5"));
        // SQLITE_BUSY_SNAPSHOT
        assert!(is_unavailable_code("517"));
        // SQLITE_IOERR_WRITE
        assert!(is_unavailable_code("778"));
        assert!(!is_unavailable_code("1"));
        // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_unavailable_code("2067"));
        assert!(!is_unavailable_code("busy"));
    }

    #[test]
    fn only_fts_messages_are_syntax_errors() {
        assert!(is_query_syntax_message("fts5: syntax error near \"AND\""));
        assert!(is_query_syntax_message("unterminated string"));
        assert!(is_query_syntax_message("no such column: nope"));
        assert!(!is_query_syntax_message("database is locked"));
        assert!(!is_query_syntax_message("disk I/O error"));
    }
}
