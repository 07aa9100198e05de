//! SQLite observation store with FTS5 full-text search.
//!
//! One database file holds sessions, observations and the derived
//! `observations_fts` index (see [`crate::schema`]). WAL journaling with
//! SQLite's single-writer lock serializes concurrent inserts, so the
//! index never sees interleaved writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemo_core::error::StoreError;
use mnemo_core::observation::{NewObservation, Observation, ObservationId};
use mnemo_core::session::{NewSession, Session, SessionId};
use mnemo_core::store::{
    ContextFilter, MAX_CONTEXT_CANDIDATES, ObservationStore, SearchHit, SearchQuery, StoreStats,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::rows::{
    encode_ts, is_query_syntax_message, map_sqlx, row_to_hit, row_to_observation, row_to_session,
};
use crate::schema;

/// Ids per `IN (...)` batch, well under SQLite's bound-parameter limit.
const ID_BATCH: usize = 500;

/// A production SQLite observation store with FTS5 full-text search.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        // An in-memory database lives only as long as a connection does.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        schema::run_migrations(&store.pool).await?;
        info!("SQLite observation store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        schema::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Re-derive the relevance index from the observation rows.
    pub async fn rebuild_index(&self) -> Result<(), StoreError> {
        schema::rebuild_index(&self.pool).await?;
        info!("Relevance index rebuilt");
        Ok(())
    }

    /// Close the pool; later calls report the store as unavailable.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_batch(&self, ids: &[ObservationId]) -> Result<Vec<Observation>, StoreError> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM observations WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("Batch fetch", e))?;
        rows.iter().map(row_to_observation).collect()
    }
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, StoreError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))
}

#[async_trait]
impl ObservationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let metadata = to_json(&session.metadata)?;
        let row = sqlx::query(
            r#"
            INSERT INTO sessions (session_key, project_path, started_at, metadata)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(&session.session_key)
        .bind(&session.project_path)
        .bind(encode_ts(&Utc::now()))
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::already_exists("session", &session.session_key)
            }
            other => map_sqlx("INSERT session", other),
        })?;

        let created = row_to_session(&row)?;
        debug!(session_key = %created.session_key, id = created.id, "Created session");
        Ok(created)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("GET session by id", e))?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn get_session_by_key(&self, session_key: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_key = ?1")
            .bind(session_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("GET session by key", e))?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY started_at DESC, id DESC LIMIT ?1")
            .bind(to_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("Recent sessions", e))?;

        rows.iter().map(row_to_session).collect()
    }

    async fn end_session(
        &self,
        session_key: &str,
        summary: Option<String>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET ended_at = ?1, summary = COALESCE(?2, summary)
            WHERE session_key = ?3 AND ended_at IS NULL
            "#,
        )
        .bind(encode_ts(&Utc::now()))
        .bind(&summary)
        .bind(session_key)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("END session", e))?;

        if result.rows_affected() > 0 {
            debug!(session_key, "Ended session");
            return Ok(true);
        }

        match self.get_session_by_key(session_key).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::not_found("session", session_key)),
        }
    }

    async fn create_observation(
        &self,
        observation: NewObservation,
    ) -> Result<Observation, StoreError> {
        let created_at = observation.created_at.unwrap_or_else(Utc::now);
        let metadata = to_json(&observation.metadata)?;

        let row = sqlx::query(
            r#"
            INSERT INTO observations
                (session_id, type, tool_name, input, output, summary, tokens, importance, created_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(observation.session_id)
        .bind(observation.obs_type.as_str())
        .bind(&observation.tool_name)
        .bind(&observation.input)
        .bind(&observation.output)
        .bind(&observation.summary)
        .bind(observation.tokens)
        .bind(observation.importance.value())
        .bind(encode_ts(&created_at))
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StoreError::not_found("session", observation.session_id)
            }
            other => map_sqlx("INSERT observation", other),
        })?;

        let created = row_to_observation(&row)?;
        debug!(id = created.id, obs_type = %created.obs_type, "Stored observation");
        Ok(created)
    }

    async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>, StoreError> {
        let row = sqlx::query("SELECT * FROM observations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("GET observation", e))?;

        row.as_ref().map(row_to_observation).transpose()
    }

    async fn get_observations(
        &self,
        ids: &[ObservationId],
    ) -> Result<Vec<Observation>, StoreError> {
        let mut found = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_BATCH) {
            found.extend(self.fetch_batch(chunk).await?);
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found.dedup_by_key(|o| o.id);
        Ok(found)
    }

    async fn session_observations(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM observations WHERE session_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(session_id)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("Session observations", e))?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn recent_observations(&self, limit: usize) -> Result<Vec<Observation>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM observations ORDER BY created_at DESC, id DESC LIMIT ?1")
                .bind(to_limit(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx("Recent observations", e))?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn update_summary(
        &self,
        id: ObservationId,
        summary: Option<String>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE observations SET summary = ?1 WHERE id = ?2")
            .bind(&summary)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("UPDATE summary", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, StoreError> {
        if query.text.trim().is_empty() || query.limit == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT o.id, o.type, o.tool_name, o.summary, o.created_at, o.importance,
                   bm25(observations_fts) AS rank
            FROM observations_fts
            JOIN observations o ON o.id = observations_fts.rowid
            JOIN sessions s ON s.id = o.session_id
            WHERE observations_fts MATCH ?1
              AND (?2 IS NULL OR o.type = ?2)
              AND (?3 IS NULL OR o.created_at >= ?3)
              AND (?4 IS NULL OR s.project_path = ?4)
            ORDER BY rank, o.id DESC
            LIMIT ?5
            "#,
        )
        .bind(&query.text)
        .bind(query.obs_type.map(|t| t.as_str()))
        .bind(query.since.as_ref().map(encode_ts))
        .bind(&query.project_path)
        .bind(to_limit(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| match e {
            // FTS5 reports bad MATCH expressions as plain database errors.
            sqlx::Error::Database(db) if is_query_syntax_message(db.message()) => {
                warn!(query = %query.text, error = %db, "Rejected search query");
                StoreError::QuerySyntax(db.message().to_string())
            }
            other => map_sqlx("FTS5 search", other),
        })?;

        rows.iter().map(row_to_hit).collect()
    }

    async fn context_candidates(
        &self,
        filter: &ContextFilter,
    ) -> Result<Vec<Observation>, StoreError> {
        if filter.include_types.is_empty() || filter.limit == 0 {
            return Ok(vec![]);
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT o.* FROM observations o JOIN sessions s ON s.id = o.session_id WHERE o.type IN (",
        );
        let mut types = qb.separated(", ");
        for t in &filter.include_types {
            types.push_bind(t.as_str());
        }
        types.push_unseparated(")");
        qb.push(" AND o.importance >= ");
        qb.push_bind(filter.min_importance.value());
        if let Some(project) = &filter.project_path {
            qb.push(" AND s.project_path = ");
            qb.push_bind(project.clone());
        }
        qb.push(" ORDER BY o.importance DESC, o.created_at DESC, o.id DESC LIMIT ");
        qb.push_bind(to_limit(filter.limit.min(MAX_CONTEXT_CANDIDATES)));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("Context candidates", e))?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn observations_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM observations
            WHERE created_at >= ?1 AND created_at <= ?2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(encode_ts(&from))
        .bind(encode_ts(&to))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("Timeline window", e))?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sessions) AS sessions,
                (SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL) AS open_sessions,
                (SELECT COUNT(*) FROM observations) AS observations
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("COUNT", e))?;

        let count = |name: &str| -> Result<u64, StoreError> {
            let n: i64 = row
                .try_get(name)
                .map_err(|e| StoreError::Storage(format!("{name} column: {e}")))?;
            Ok(u64::try_from(n).unwrap_or_default())
        };

        Ok(StoreStats {
            sessions: count("sessions")?,
            open_sessions: count("open_sessions")?,
            observations: count("observations")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use mnemo_core::observation::{Importance, ObservationMetadata, ObservationType};
    use mnemo_core::session::SessionMetadata;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    async fn session(store: &SqliteStore, key: &str, project: Option<&str>) -> Session {
        store
            .create_session(NewSession::new(key).with_project(project.map(String::from)))
            .await
            .unwrap()
    }

    fn make_obs(session_id: SessionId, obs_type: ObservationType, output: &str) -> NewObservation {
        let mut obs = NewObservation::new(session_id, obs_type);
        obs.tool_name = Some("Bash".into());
        obs.output = Some(output.into());
        obs
    }

    #[tokio::test]
    async fn session_create_and_lookup() {
        let store = test_store().await;
        let created = store
            .create_session(
                NewSession::new("s1")
                    .with_project(Some("/work/app".into()))
                    .with_metadata(SessionMetadata::Api),
            )
            .await
            .unwrap();
        assert!(created.is_open());
        assert_eq!(created.metadata, Some(SessionMetadata::Api));

        let by_key = store.get_session_by_key("s1").await.unwrap().unwrap();
        assert_eq!(by_key, created);
        let by_id = store.get_session(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.project_path.as_deref(), Some("/work/app"));
        assert!(store.get_session_by_key("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_session_key_is_rejected() {
        let store = test_store().await;
        session(&store, "s1", None).await;
        let err = store.create_session(NewSession::new("s1")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { entity: "session", .. }));
    }

    #[tokio::test]
    async fn session_ends_exactly_once() {
        let store = test_store().await;
        session(&store, "s1", None).await;

        assert!(store.end_session("s1", Some("shipped parser".into())).await.unwrap());
        assert!(!store.end_session("s1", Some("again".into())).await.unwrap());

        let ended = store.get_session_by_key("s1").await.unwrap().unwrap();
        assert!(ended.ended_at.is_some());
        assert_eq!(ended.summary.as_deref(), Some("shipped parser"));

        let err = store.end_session("ghost", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn observation_requires_existing_session() {
        let store = test_store().await;
        let err = store
            .create_observation(make_obs(999, ObservationType::ToolUse, "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "session", .. }));
    }

    #[tokio::test]
    async fn observation_round_trip() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let mut new = make_obs(s.id, ObservationType::Bugfix, "fixed, tests passed");
        new.input = Some("fix null pointer".into());
        new.importance = Importance::new(0.9);
        new.tokens = Some(5);
        new.metadata = Some(ObservationMetadata::ToolResult {
            input_truncated: false,
            output_truncated: true,
            auto_classified: true,
        });

        let created = store.create_observation(new).await.unwrap();
        let fetched = store.get_observation(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.obs_type, ObservationType::Bugfix);
        assert_eq!(fetched.importance.value(), 0.9);
        assert!(matches!(
            fetched.metadata,
            Some(ObservationMetadata::ToolResult { output_truncated: true, .. })
        ));
        assert!(store.get_observation(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_fetch_omits_missing_ids() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let first = store
            .create_observation(make_obs(s.id, ObservationType::ToolUse, "one"))
            .await
            .unwrap();

        let found = store.get_observations(&[first.id, 999]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);
        assert!(store.get_observations(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_fetch_is_newest_first() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let base = Utc::now() - ChronoDuration::hours(3);
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut new = make_obs(s.id, ObservationType::ToolUse, &format!("step {i}"));
            new.created_at = Some(base + ChronoDuration::minutes(i));
            ids.push(store.create_observation(new).await.unwrap().id);
        }

        let found = store.get_observations(&[ids[0], ids[2], ids[1]]).await.unwrap();
        let order: Vec<i64> = found.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn insert_is_immediately_searchable() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let created = store
            .create_observation(make_obs(s.id, ObservationType::Bugfix, "resolved xyzzy deadlock"))
            .await
            .unwrap();

        let hits = store.search(&SearchQuery::new("xyzzy")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, created.id);
        assert_eq!(hits[0].obs_type, ObservationType::Bugfix);
    }

    #[tokio::test]
    async fn search_ranks_better_matches_first() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        store
            .create_observation(make_obs(s.id, ObservationType::ToolUse, "parser parser parser cache"))
            .await
            .unwrap();
        store
            .create_observation(make_obs(
                s.id,
                ObservationType::ToolUse,
                "a long note that mentions the parser only once among many other unrelated words",
            ))
            .await
            .unwrap();

        let hits = store.search(&SearchQuery::new("parser")).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].rank <= hits[1].rank);

        let again = store.search(&SearchQuery::new("parser")).await.unwrap();
        assert_eq!(hits, again);
    }

    #[tokio::test]
    async fn search_filters_are_conjunctive() {
        let store = test_store().await;
        let app = session(&store, "s1", Some("/work/app")).await;
        let lib = session(&store, "s2", Some("/work/lib")).await;

        let mut old = make_obs(app.id, ObservationType::Bugfix, "cache bug old");
        old.created_at = Some(Utc::now() - ChronoDuration::days(10));
        store.create_observation(old).await.unwrap();
        store
            .create_observation(make_obs(app.id, ObservationType::Bugfix, "cache bug new"))
            .await
            .unwrap();
        store
            .create_observation(make_obs(app.id, ObservationType::Testing, "cache tests"))
            .await
            .unwrap();
        store
            .create_observation(make_obs(lib.id, ObservationType::Bugfix, "cache bug elsewhere"))
            .await
            .unwrap();

        let mut query = SearchQuery::new("cache");
        assert_eq!(store.search(&query).await.unwrap().len(), 4);

        query.obs_type = Some(ObservationType::Bugfix);
        assert_eq!(store.search(&query).await.unwrap().len(), 3);

        query.since = Some(Utc::now() - ChronoDuration::days(1));
        assert_eq!(store.search(&query).await.unwrap().len(), 2);

        query.project_path = Some("/work/app".into());
        let hits = store.search(&query).await.unwrap();
        assert_eq!(hits.len(), 1);

        query.limit = 0;
        assert!(store.search(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        for i in 0..20 {
            store
                .create_observation(make_obs(s.id, ObservationType::ToolUse, &format!("topic number {i}")))
                .await
                .unwrap();
        }
        let mut query = SearchQuery::new("topic");
        query.limit = 5;
        assert_eq!(store.search(&query).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn malformed_query_is_a_syntax_error() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        store
            .create_observation(make_obs(s.id, ObservationType::ToolUse, "anything"))
            .await
            .unwrap();

        let err = store.search(&SearchQuery::new("\"unbalanced")).await.unwrap_err();
        assert!(matches!(err, StoreError::QuerySyntax(_)));
    }

    #[tokio::test]
    async fn empty_corpus_and_blank_query_return_nothing() {
        let store = test_store().await;
        assert!(store.search(&SearchQuery::new("anything")).await.unwrap().is_empty());
        assert!(store.search(&SearchQuery::new("   ")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_backfill_is_reindexed() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let created = store
            .create_observation(make_obs(s.id, ObservationType::Decision, "chose sqlite"))
            .await
            .unwrap();

        assert!(store.search(&SearchQuery::new("persistence")).await.unwrap().is_empty());
        assert!(store
            .update_summary(created.id, Some("persistence layer decision".into()))
            .await
            .unwrap());
        let hits = store.search(&SearchQuery::new("persistence")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].summary.as_deref(), Some("persistence layer decision"));

        assert!(!store.update_summary(9999, None).await.unwrap());
    }

    #[tokio::test]
    async fn rebuilt_index_matches_rows() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        store
            .create_observation(make_obs(s.id, ObservationType::ToolUse, "rebuild me"))
            .await
            .unwrap();
        store.rebuild_index().await.unwrap();
        assert_eq!(store.search(&SearchQuery::new("rebuild")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn context_candidates_order_and_filters() {
        let store = test_store().await;
        let app = session(&store, "s1", Some("/work/app")).await;
        let lib = session(&store, "s2", Some("/work/lib")).await;
        let base = Utc::now() - ChronoDuration::hours(1);

        let insert = async |sid: SessionId, t: ObservationType, importance: f64, minutes: i64| {
            let mut new = make_obs(sid, t, "x");
            new.importance = Importance::new(importance);
            new.created_at = Some(base + ChronoDuration::minutes(minutes));
            store.create_observation(new).await.unwrap().id
        };

        let _low = insert(app.id, ObservationType::Bugfix, 0.4, 0).await;
        let older_high = insert(app.id, ObservationType::Decision, 0.8, 1).await;
        let newer_high = insert(app.id, ObservationType::Architecture, 0.8, 2).await;
        let top = insert(lib.id, ObservationType::Bugfix, 1.0, 3).await;
        let _wrong_type = insert(app.id, ObservationType::Exploration, 0.9, 4).await;

        let ids = |v: Vec<Observation>| v.iter().map(|o| o.id).collect::<Vec<_>>();

        let all = store.context_candidates(&ContextFilter::default()).await.unwrap();
        assert_eq!(ids(all), vec![top, newer_high, older_high]);

        let scoped = ContextFilter {
            project_path: Some("/work/app".into()),
            ..ContextFilter::default()
        };
        assert_eq!(
            ids(store.context_candidates(&scoped).await.unwrap()),
            vec![newer_high, older_high]
        );

        let capped = ContextFilter {
            limit: 1,
            ..ContextFilter::default()
        };
        assert_eq!(ids(store.context_candidates(&capped).await.unwrap()), vec![top]);

        let none = ContextFilter {
            include_types: vec![],
            ..ContextFilter::default()
        };
        assert!(store.context_candidates(&none).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn window_is_inclusive_and_ascending() {
        let store = test_store().await;
        let s = session(&store, "s1", None).await;
        let center = Utc::now() - ChronoDuration::days(1);

        let at = async |offset: ChronoDuration| {
            let mut new = make_obs(s.id, ObservationType::ToolUse, "tick");
            new.created_at = Some(center + offset);
            store.create_observation(new).await.unwrap().id
        };

        let after = at(ChronoDuration::hours(2)).await;
        let before = at(-ChronoDuration::hours(2)).await;
        let _outside = at(ChronoDuration::hours(2) + ChronoDuration::minutes(1)).await;
        let mid = at(ChronoDuration::zero()).await;

        let window = store
            .observations_between(center - ChronoDuration::hours(2), center + ChronoDuration::hours(2))
            .await
            .unwrap();
        let order: Vec<i64> = window.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![before, mid, after]);
    }

    #[tokio::test]
    async fn listings_and_stats() {
        let store = test_store().await;
        let a = session(&store, "a", None).await;
        let b = session(&store, "b", None).await;
        for i in 0..3 {
            store
                .create_observation(make_obs(a.id, ObservationType::ToolUse, &format!("a{i}")))
                .await
                .unwrap();
        }
        store
            .create_observation(make_obs(b.id, ObservationType::ToolUse, "b0"))
            .await
            .unwrap();
        store.end_session("a", None).await.unwrap();

        assert_eq!(store.session_observations(a.id, 10).await.unwrap().len(), 3);
        assert_eq!(store.session_observations(a.id, 2).await.unwrap().len(), 2);
        assert_eq!(store.recent_observations(10).await.unwrap().len(), 4);
        assert_eq!(store.recent_sessions(10).await.unwrap().len(), 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                sessions: 2,
                open_sessions: 1,
                observations: 4
            }
        );
    }

    #[tokio::test]
    async fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("mnemo.sqlite").display());

        let store = SqliteStore::new(&url).await.unwrap();
        let s = session(&store, "s1", None).await;
        store
            .create_observation(make_obs(s.id, ObservationType::Decision, "durable decision"))
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteStore::new(&url).await.unwrap();
        assert_eq!(reopened.search(&SearchQuery::new("durable")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let store = test_store().await;
        store.close().await;
        let err = store.stats().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn backend_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }
}
