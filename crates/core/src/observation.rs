//! Observations: one recorded unit of agent activity.
//!
//! An observation is created exactly once per ingested activity and is
//! never deleted by the core. Only `summary` and `metadata` may be
//! back-filled after creation; identity and `created_at` are fixed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::session::SessionId;

/// Surrogate id of an observation row.
pub type ObservationId = i64;

/// The kind of work an observation captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    ToolUse,
    Decision,
    Bugfix,
    Architecture,
    CodeChange,
    GitOperation,
    Testing,
    Dependency,
    Research,
    Exploration,
    Command,
    Routine,
}

impl ObservationType {
    pub const ALL: [ObservationType; 12] = [
        ObservationType::ToolUse,
        ObservationType::Decision,
        ObservationType::Bugfix,
        ObservationType::Architecture,
        ObservationType::CodeChange,
        ObservationType::GitOperation,
        ObservationType::Testing,
        ObservationType::Dependency,
        ObservationType::Research,
        ObservationType::Exploration,
        ObservationType::Command,
        ObservationType::Routine,
    ];

    /// The tag as stored and indexed.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::ToolUse => "tool_use",
            ObservationType::Decision => "decision",
            ObservationType::Bugfix => "bugfix",
            ObservationType::Architecture => "architecture",
            ObservationType::CodeChange => "code_change",
            ObservationType::GitOperation => "git_operation",
            ObservationType::Testing => "testing",
            ObservationType::Dependency => "dependency",
            ObservationType::Research => "research",
            ObservationType::Exploration => "exploration",
            ObservationType::Command => "command",
            ObservationType::Routine => "routine",
        }
    }

    /// Types injected at session start unless configured otherwise.
    pub fn default_injected() -> Vec<ObservationType> {
        vec![
            ObservationType::Decision,
            ObservationType::Bugfix,
            ObservationType::Architecture,
        ]
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a type tag is not part of the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown observation type: {0}")]
pub struct UnknownObservationType(pub String);

impl FromStr for ObservationType {
    type Err = UnknownObservationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        ObservationType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| UnknownObservationType(s.to_string()))
    }
}

/// Importance score, always inside `[0.0, 1.0]`.
///
/// Every construction path clamps, so an out-of-range value can never
/// reach storage. NaN collapses to the neutral default.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Importance(f64);

impl Importance {
    pub const MIN: Importance = Importance(0.0);
    pub const MAX: Importance = Importance(1.0);
    pub const NEUTRAL: Importance = Importance(0.5);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEUTRAL;
        }
        Importance(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<f64> for Importance {
    fn from(value: f64) -> Self {
        Importance::new(value)
    }
}

impl From<Importance> for f64 {
    fn from(value: Importance) -> Self {
        value.0
    }
}

/// Known metadata shapes attached to observations.
///
/// `Unrecognized` only appears when a stored row carries a JSON object
/// that matches none of the known shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationMetadata {
    /// Captured from a tool-result hook.
    ToolResult {
        input_truncated: bool,
        output_truncated: bool,
        auto_classified: bool,
    },
    /// Recorded explicitly through the observations API.
    Manual,
    Unrecognized {
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl ObservationMetadata {
    /// Decode a stored metadata blob, falling back to a plain map.
    pub fn from_stored(raw: &str) -> Option<Self> {
        if let Ok(meta) = serde_json::from_str::<Self>(raw) {
            return Some(meta);
        }
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
            Ok(fields) => Some(Self::Unrecognized { fields }),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable observation metadata");
                None
            }
        }
    }
}

/// A stored observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<i64>,
    pub importance: Importance,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObservationMetadata>,
}

/// Longest slice of output/input shown on a context line.
pub const DISPLAY_TEXT_CHARS: usize = 200;

impl Observation {
    /// The text used when this observation is injected into context.
    ///
    /// Prefers the summary, then output, then input, then the tool name.
    pub fn display_text(&self) -> String {
        display_text_for(
            self.summary.as_deref(),
            self.output.as_deref(),
            self.input.as_deref(),
            self.tool_name.as_deref(),
            self.obs_type,
        )
    }
}

pub(crate) fn display_text_for(
    summary: Option<&str>,
    output: Option<&str>,
    input: Option<&str>,
    tool_name: Option<&str>,
    obs_type: ObservationType,
) -> String {
    let text = [summary, output, input]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty());
    match text {
        Some(t) => t.chars().take(DISPLAY_TEXT_CHARS).collect(),
        None => match tool_name {
            Some(tool) => format!("{obs_type} via {tool}"),
            None => obs_type.to_string(),
        },
    }
}

/// Everything needed to insert an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub session_id: SessionId,
    pub obs_type: ObservationType,
    pub tool_name: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub summary: Option<String>,
    pub tokens: Option<i64>,
    pub importance: Importance,
    pub metadata: Option<ObservationMetadata>,
    /// Backdated timestamp for imports; the store uses the insertion time when absent.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewObservation {
    pub fn new(session_id: SessionId, obs_type: ObservationType) -> Self {
        Self {
            session_id,
            obs_type,
            tool_name: None,
            input: None,
            output: None,
            summary: None,
            tokens: None,
            importance: Importance::default(),
            metadata: None,
            created_at: None,
        }
    }

    /// The text this observation will be injected as, once stored.
    pub fn display_text(&self) -> String {
        display_text_for(
            self.summary.as_deref(),
            self.output.as_deref(),
            self.input.as_deref(),
            self.tool_name.as_deref(),
            self.obs_type,
        )
    }
}
