//! The mnemo retrieval and assembly engine.
//!
//! `MemoryEngine` sits between the worker's transport and the
//! observation store:
//!
//! 1. **Ingest**: get-or-create the session, classify and bound the
//!    activity, precompute its token cost, store it
//! 2. **Search**: ranked relevance queries; a malformed query becomes an
//!    empty result carrying an error message
//! 3. **Inject**: filter candidates, budget them, render context lines
//! 4. **Timeline**: a chronological window around one observation
//!
//! The store handle is passed in at construction. Nothing here reads the
//! process environment.

pub mod context;
pub mod ingest;
pub mod search;
pub mod timeline;

use std::sync::Arc;

use mnemo_config::{AppConfig, ContextConfig, IngestConfig};
use mnemo_core::error::{Result, StoreError};
use mnemo_core::observation::{Observation, ObservationId};
use mnemo_core::session::Session;
use mnemo_core::store::{ObservationStore, StoreStats};

pub use context::{InjectedContext, SessionStart, format_context_line};
pub use ingest::{ObservationInput, Origin};
pub use search::SearchOutcome;
pub use timeline::{DEFAULT_RANGE_HOURS, Timeline};

/// Default number of rows returned by the listing operations.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Shared engine handle. Cheap to clone.
#[derive(Clone)]
pub struct MemoryEngine {
    store: Arc<dyn ObservationStore>,
    context: ContextConfig,
    ingest: IngestConfig,
}

impl MemoryEngine {
    pub fn new(store: Arc<dyn ObservationStore>, config: &AppConfig) -> Self {
        Self {
            store,
            context: config.context.clone(),
            ingest: config.ingest.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    pub fn context_config(&self) -> &ContextConfig {
        &self.context
    }

    pub async fn get_session(&self, session_key: &str) -> Result<Option<Session>> {
        Ok(self.store.get_session_by_key(session_key).await?)
    }

    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        Ok(self.store.recent_sessions(limit).await?)
    }

    pub async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>> {
        Ok(self.store.get_observation(id).await?)
    }

    /// Fetch a batch of ids. Unknown ids are dropped, newest first.
    pub async fn get_observations(&self, ids: &[ObservationId]) -> Result<Vec<Observation>> {
        Ok(self.store.get_observations(ids).await?)
    }

    /// Newest observations, optionally scoped to one session.
    pub async fn list_observations(
        &self,
        session_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Observation>> {
        match session_key {
            Some(key) => {
                let session = self
                    .store
                    .get_session_by_key(key)
                    .await?
                    .ok_or_else(|| StoreError::not_found("session", key))?;
                Ok(self.store.session_observations(session.id, limit).await?)
            }
            None => Ok(self.store.recent_observations(limit).await?),
        }
    }

    /// Back-fill the summary of an existing observation.
    pub async fn update_summary(
        &self,
        id: ObservationId,
        summary: Option<String>,
    ) -> Result<Observation> {
        if !self.store.update_summary(id, summary).await? {
            return Err(StoreError::not_found("observation", id).into());
        }
        self.store
            .get_observation(id)
            .await?
            .ok_or_else(|| StoreError::not_found("observation", id).into())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats().await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use mnemo_memory::SqliteStore;

    pub async fn engine_with(config: AppConfig) -> MemoryEngine {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        MemoryEngine::new(Arc::new(store), &config)
    }
}
