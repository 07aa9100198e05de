//! Observation store trait: durable sessions, observations and the
//! relevance index derived from them.
//!
//! The store exposes plain create/get primitives. It never upserts:
//! get-or-create sequencing belongs to the caller. Every observation
//! insert is indexed before it returns, so it is searchable immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::observation::{Importance, NewObservation, Observation, ObservationId, ObservationType};
use crate::session::{NewSession, Session, SessionId};

/// Default number of search hits.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Hard cap on the context-candidate query.
pub const MAX_CONTEXT_CANDIDATES: usize = 100;

/// A relevance query against the index. Filters are conjunctive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub obs_type: Option<ObservationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            obs_type: None,
            since: None,
            project_path: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// One ranked search result.
///
/// `rank` is the index's native score; lower is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ObservationId,
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    pub tool_name: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub importance: Importance,
    pub rank: f64,
}

/// Filter producing the candidates for context injection.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFilter {
    pub include_types: Vec<ObservationType>,
    pub min_importance: Importance,
    pub project_path: Option<String>,
    pub limit: usize,
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self {
            include_types: ObservationType::default_injected(),
            min_importance: Importance::NEUTRAL,
            project_path: None,
            limit: MAX_CONTEXT_CANDIDATES,
        }
    }
}

/// Row counts for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub sessions: u64,
    pub open_sessions: u64,
    pub observations: u64,
}

/// The core ObservationStore trait.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// The backend name (e.g., "sqlite").
    fn name(&self) -> &str;

    // --- Sessions ---

    /// Insert a session. Fails with `AlreadyExists` when the key is taken.
    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError>;

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    async fn get_session_by_key(&self, session_key: &str) -> Result<Option<Session>, StoreError>;

    /// Most recently started sessions first.
    async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>, StoreError>;

    /// Close an open session. Returns `false` if it was already closed;
    /// `NotFound` if the key is unknown.
    async fn end_session(
        &self,
        session_key: &str,
        summary: Option<String>,
    ) -> Result<bool, StoreError>;

    // --- Observations ---

    /// Insert an observation and index it before returning.
    async fn create_observation(&self, observation: NewObservation)
    -> Result<Observation, StoreError>;

    async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>, StoreError>;

    /// Fetch the ids that exist, newest first. Missing ids are omitted.
    async fn get_observations(&self, ids: &[ObservationId])
    -> Result<Vec<Observation>, StoreError>;

    /// Observations of one session, newest first.
    async fn session_observations(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Newest observations across all sessions.
    async fn recent_observations(&self, limit: usize) -> Result<Vec<Observation>, StoreError>;

    /// Back-fill the summary. Returns `false` if the id is unknown.
    async fn update_summary(
        &self,
        id: ObservationId,
        summary: Option<String>,
    ) -> Result<bool, StoreError>;

    // --- Retrieval ---

    /// Ranked relevance search. A malformed query yields `QuerySyntax`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, StoreError>;

    /// Candidates for injection, importance descending then newest first.
    async fn context_candidates(
        &self,
        filter: &ContextFilter,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Observations with `from <= created_at <= to`, oldest first.
    async fn observations_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
