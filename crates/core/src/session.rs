//! Sessions: one per agent working period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate id of a session row.
pub type SessionId = i64;

/// Where a session was first opened from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionMetadata {
    /// Opened by the session-start hook or implicitly by a tool-result hook.
    Hook,
    /// Opened through the sessions API.
    Api,
    Unrecognized {
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl SessionMetadata {
    /// Decode a stored metadata blob, falling back to a plain map.
    pub fn from_stored(raw: &str) -> Option<Self> {
        if let Ok(meta) = serde_json::from_str::<Self>(raw) {
            return Some(meta);
        }
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
            Ok(fields) => Some(Self::Unrecognized { fields }),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable session metadata");
                None
            }
        }
    }
}

/// A stored session.
///
/// `ended_at` is `None` exactly while the session is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Everything needed to insert a session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub session_key: String,
    pub project_path: Option<String>,
    pub metadata: Option<SessionMetadata>,
}

impl NewSession {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            project_path: None,
            metadata: None,
        }
    }

    pub fn with_project(mut self, project_path: Option<String>) -> Self {
        self.project_path = project_path;
        self
    }

    pub fn with_metadata(mut self, metadata: SessionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
