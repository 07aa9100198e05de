//! Ingestion: sessions and observations on their way into the store.

use mnemo_core::classifier::{DEFAULT_TYPE, classify};
use mnemo_core::error::{Error, Result, StoreError};
use mnemo_core::observation::{
    Importance, NewObservation, Observation, ObservationMetadata, ObservationType,
};
use mnemo_core::session::{NewSession, Session, SessionMetadata};
use mnemo_core::token::estimate_tokens;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::MemoryEngine;

/// Which surface an ingested record came through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Lifecycle and tool-result hooks of the host agent.
    #[default]
    Hook,
    /// The sessions/observations API.
    Api,
}

impl Origin {
    fn session_metadata(self) -> SessionMetadata {
        match self {
            Origin::Hook => SessionMetadata::Hook,
            Origin::Api => SessionMetadata::Api,
        }
    }
}

/// One activity to record.
///
/// `obs_type` and `importance` are filled in by the classifier when absent.
#[derive(Debug, Clone, Default)]
pub struct ObservationInput {
    pub session_key: String,
    pub project_path: Option<String>,
    pub obs_type: Option<ObservationType>,
    pub importance: Option<f64>,
    pub tool_name: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub summary: Option<String>,
    pub origin: Origin,
}

/// Cut `text` to at most `max_chars` characters.
fn bound(text: Option<String>, max_chars: usize) -> (Option<String>, bool) {
    match text {
        Some(t) if t.chars().count() > max_chars => (Some(t.chars().take(max_chars).collect()), true),
        other => (other, false),
    }
}

fn require_key(session_key: &str) -> Result<()> {
    if session_key.trim().is_empty() {
        return Err(Error::validation("session_key must not be empty"));
    }
    Ok(())
}

impl MemoryEngine {
    /// Return the session for `session_key`, creating it on first contact.
    ///
    /// An existing session is reused as-is; `project_path` is only
    /// recorded at creation.
    pub async fn ensure_session(
        &self,
        session_key: &str,
        project_path: Option<String>,
        origin: Origin,
    ) -> Result<Session> {
        require_key(session_key)?;
        if let Some(existing) = self.store.get_session_by_key(session_key).await? {
            return Ok(existing);
        }

        let new = NewSession::new(session_key)
            .with_project(project_path)
            .with_metadata(origin.session_metadata());
        match self.store.create_session(new).await {
            Ok(session) => {
                info!(session_key, "Session started");
                Ok(session)
            }
            // Lost a race with a concurrent first contact.
            Err(StoreError::AlreadyExists { .. }) => self
                .store
                .get_session_by_key(session_key)
                .await?
                .ok_or_else(|| StoreError::not_found("session", session_key).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Close a session. `Ok(false)` when it was already closed.
    pub async fn end_session(&self, session_key: &str, summary: Option<String>) -> Result<bool> {
        require_key(session_key)?;
        let ended = self.store.end_session(session_key, summary).await?;
        if ended {
            info!(session_key, "Session ended");
        }
        Ok(ended)
    }

    /// Classify, bound and store one activity.
    pub async fn record_observation(&self, request: ObservationInput) -> Result<Observation> {
        let session = self
            .ensure_session(&request.session_key, request.project_path, request.origin)
            .await?;

        let max_chars = self.ingest.max_field_chars;
        let (input, input_truncated) = bound(request.input, max_chars);
        let (output, output_truncated) = bound(request.output, max_chars);

        let auto_classified = request.obs_type.is_none() || request.importance.is_none();
        let classification = auto_classified.then(|| {
            classify(
                request.tool_name.as_deref().unwrap_or_default(),
                input.as_deref().unwrap_or_default(),
                output.as_deref().unwrap_or_default(),
            )
        });

        let obs_type = request
            .obs_type
            .or(classification.map(|c| c.obs_type))
            .unwrap_or(DEFAULT_TYPE);
        let importance = match (request.importance, classification) {
            (Some(value), _) => Importance::new(value),
            (None, Some(c)) => c.importance,
            (None, None) => Importance::default(),
        };

        let mut new = NewObservation::new(session.id, obs_type);
        new.tool_name = request.tool_name;
        new.input = input;
        new.output = output;
        new.summary = request.summary;
        new.importance = importance;
        new.metadata = Some(match request.origin {
            Origin::Hook => ObservationMetadata::ToolResult {
                input_truncated,
                output_truncated,
                auto_classified,
            },
            Origin::Api => ObservationMetadata::Manual,
        });
        new.tokens = i64::try_from(estimate_tokens(&new.display_text())).ok();

        let created = self.store.create_observation(new).await?;
        debug!(
            id = created.id,
            obs_type = %created.obs_type,
            importance = created.importance.value(),
            rule = classification.map(|c| c.rule).unwrap_or("explicit"),
            "Recorded observation"
        );
        Ok(created)
    }
}
