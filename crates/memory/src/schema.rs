//! Schema migrations for the SQLite store.
//!
//! Two primary tables plus an external-content FTS5 index:
//! - `sessions`: one row per agent working period
//! - `observations`: one row per captured activity
//! - `observations_fts`: ranked keyword index over type, tool name,
//!   input, output and summary
//!
//! Triggers keep the index in sync on insert/delete/update, so it can
//! always be rebuilt from `observations` alone.

use mnemo_core::error::StoreError;
use sqlx::SqlitePool;
use tracing::debug;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "sessions table",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_key  TEXT NOT NULL UNIQUE,
            project_path TEXT,
            started_at   TEXT NOT NULL,
            ended_at     TEXT,
            summary      TEXT,
            metadata     TEXT
        )
        "#,
    ),
    (
        "observations table",
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  INTEGER NOT NULL REFERENCES sessions(id),
            type        TEXT NOT NULL,
            tool_name   TEXT,
            input       TEXT,
            output      TEXT,
            summary     TEXT,
            tokens      INTEGER,
            importance  REAL NOT NULL DEFAULT 0.5
                        CHECK (importance >= 0.0 AND importance <= 1.0),
            created_at  TEXT NOT NULL,
            metadata    TEXT
        )
        "#,
    ),
    (
        "FTS5 table",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
            type,
            tool_name,
            input,
            output,
            summary,
            content='observations',
            content_rowid='id',
            tokenize='porter unicode61'
        )
        "#,
    ),
    (
        "insert trigger",
        r#"
        CREATE TRIGGER IF NOT EXISTS observations_ai AFTER INSERT ON observations BEGIN
            INSERT INTO observations_fts(rowid, type, tool_name, input, output, summary)
            VALUES (new.id, new.type, new.tool_name, new.input, new.output, new.summary);
        END
        "#,
    ),
    (
        "delete trigger",
        r#"
        CREATE TRIGGER IF NOT EXISTS observations_ad AFTER DELETE ON observations BEGIN
            INSERT INTO observations_fts(observations_fts, rowid, type, tool_name, input, output, summary)
            VALUES ('delete', old.id, old.type, old.tool_name, old.input, old.output, old.summary);
        END
        "#,
    ),
    (
        "update trigger",
        r#"
        CREATE TRIGGER IF NOT EXISTS observations_au AFTER UPDATE ON observations BEGIN
            INSERT INTO observations_fts(observations_fts, rowid, type, tool_name, input, output, summary)
            VALUES ('delete', old.id, old.type, old.tool_name, old.input, old.output, old.summary);
            INSERT INTO observations_fts(rowid, type, tool_name, input, output, summary)
            VALUES (new.id, new.type, new.tool_name, new.input, new.output, new.summary);
        END
        "#,
    ),
    (
        "created_at index",
        "CREATE INDEX IF NOT EXISTS idx_observations_created_at ON observations(created_at)",
    ),
    (
        "session index",
        "CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id, created_at)",
    ),
    (
        "importance index",
        "CREATE INDEX IF NOT EXISTS idx_observations_importance ON observations(type, importance DESC, created_at DESC)",
    ),
    (
        "started_at index",
        "CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at DESC)",
    ),
];

/// Create tables, the FTS5 index and its triggers. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    for (name, sql) in STATEMENTS {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
    }
    debug!("SQLite migrations complete");
    Ok(())
}

/// Rebuild the relevance index from the observations table.
pub async fn rebuild_index(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO observations_fts(observations_fts) VALUES ('rebuild')")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Storage(format!("FTS rebuild: {e}")))?;
    Ok(())
}
