//! Context injection.
//!
//! Candidates come from the store already ordered by importance, then
//! recency. The budgeter takes the longest prefix that fits, and each
//! selected observation becomes one `[#id date] text` line.

use mnemo_core::budget::select_for_budget;
use mnemo_core::error::Result;
use mnemo_core::observation::Observation;
use mnemo_core::session::Session;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::MemoryEngine;
use crate::ingest::Origin;

/// What gets prepended to a new session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedContext {
    pub observations: Vec<Observation>,
    pub total_tokens: usize,
    pub context_text: String,
}

/// Reply to the session-start hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session: Session,
    pub context: InjectedContext,
}

/// One context line: `[#42 2026-10-18] fixed the parser panic`.
pub fn format_context_line(observation: &Observation) -> String {
    format!(
        "[#{} {}] {}",
        observation.id,
        observation.created_at.format("%Y-%m-%d"),
        observation.display_text()
    )
}

impl MemoryEngine {
    /// Select and render the observations to inject.
    ///
    /// `max_tokens` falls back to the configured ceiling. Returns an empty
    /// context when injection is disabled.
    pub async fn context_for_injection(
        &self,
        project_path: Option<String>,
        max_tokens: Option<usize>,
    ) -> Result<InjectedContext> {
        if !self.context.enabled {
            return Ok(InjectedContext::default());
        }

        let max_tokens = max_tokens.unwrap_or(self.context.max_tokens);
        let filter = self.context.filter(project_path);
        let candidates = self.store.context_candidates(&filter).await?;
        let considered = candidates.len();

        let selection = select_for_budget(candidates, max_tokens);
        let context_text = selection
            .selected
            .iter()
            .map(format_context_line)
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            considered,
            selected = selection.selected.len(),
            total_tokens = selection.total_tokens,
            max_tokens,
            "Assembled injection context"
        );

        Ok(InjectedContext {
            observations: selection.selected,
            total_tokens: selection.total_tokens,
            context_text,
        })
    }

    /// Open (or reuse) the session and assemble its opening context.
    pub async fn session_start(
        &self,
        session_key: &str,
        project_path: Option<String>,
    ) -> Result<SessionStart> {
        let session = self
            .ensure_session(session_key, project_path, Origin::Hook)
            .await?;
        let context = self
            .context_for_injection(session.project_path.clone(), None)
            .await?;
        Ok(SessionStart { session, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ObservationInput;
    use crate::test_support::engine_with;
    use chrono::{TimeZone, Utc};
    use mnemo_config::AppConfig;
    use mnemo_core::observation::{Importance, ObservationType};

    fn manual(key: &str, obs_type: ObservationType, importance: f64, summary: &str) -> ObservationInput {
        ObservationInput {
            session_key: key.into(),
            obs_type: Some(obs_type),
            importance: Some(importance),
            summary: Some(summary.into()),
            origin: Origin::Api,
            ..Default::default()
        }
    }

    #[test]
    fn context_line_format() {
        let observation = Observation {
            id: 42,
            session_id: 1,
            obs_type: ObservationType::Bugfix,
            tool_name: Some("Edit".into()),
            input: None,
            output: Some("fixed, tests passed".into()),
            summary: None,
            tokens: None,
            importance: Importance::new(0.9),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 0).unwrap(),
            metadata: None,
        };
        assert_eq!(
            format_context_line(&observation),
            "[#42 2026-10-18] fixed, tests passed"
        );
    }

    #[tokio::test]
    async fn only_default_types_above_threshold_are_injected() {
        let engine = engine_with(AppConfig::default()).await;
        let decision = engine
            .record_observation(manual("s1", ObservationType::Decision, 0.8, "use sqlite"))
            .await
            .unwrap();
        engine
            .record_observation(manual("s1", ObservationType::Exploration, 0.9, "read docs"))
            .await
            .unwrap();
        engine
            .record_observation(manual("s1", ObservationType::Bugfix, 0.2, "typo"))
            .await
            .unwrap();

        let context = engine.context_for_injection(None, None).await.unwrap();
        assert_eq!(context.observations.len(), 1);
        assert_eq!(context.observations[0].id, decision.id);
        assert!(context.context_text.ends_with("] use sqlite"));
        assert_eq!(context.total_tokens, 3);
    }

    #[tokio::test]
    async fn budget_stops_at_first_overflow() {
        let engine = engine_with(AppConfig::default()).await;
        // 40 chars -> 10 tokens each; importance sets the order.
        let text = "x".repeat(40);
        for importance in [0.9, 0.8, 0.7] {
            engine
                .record_observation(manual("s1", ObservationType::Decision, importance, &text))
                .await
                .unwrap();
        }

        let context = engine.context_for_injection(None, Some(25)).await.unwrap();
        assert_eq!(context.observations.len(), 2);
        assert_eq!(context.total_tokens, 20);
        assert_eq!(context.context_text.lines().count(), 2);
    }

    #[tokio::test]
    async fn project_scope_limits_candidates() {
        let engine = engine_with(AppConfig::default()).await;
        engine.ensure_session("a", Some("/work/a".into()), Origin::Hook).await.unwrap();
        engine.ensure_session("b", Some("/work/b".into()), Origin::Hook).await.unwrap();
        engine
            .record_observation(manual("a", ObservationType::Architecture, 0.7, "layered crates"))
            .await
            .unwrap();
        engine
            .record_observation(manual("b", ObservationType::Architecture, 0.7, "single binary"))
            .await
            .unwrap();

        let scoped = engine
            .context_for_injection(Some("/work/b".into()), None)
            .await
            .unwrap();
        assert_eq!(scoped.observations.len(), 1);
        assert!(scoped.context_text.contains("single binary"));

        let all = engine.context_for_injection(None, None).await.unwrap();
        assert_eq!(all.observations.len(), 2);
    }

    #[tokio::test]
    async fn disabled_injection_is_empty() {
        let mut config = AppConfig::default();
        config.context.enabled = false;
        let engine = engine_with(config).await;
        engine
            .record_observation(manual("s1", ObservationType::Decision, 0.9, "kept"))
            .await
            .unwrap();

        let context = engine.context_for_injection(None, None).await.unwrap();
        assert_eq!(context, InjectedContext::default());
    }

    #[tokio::test]
    async fn session_start_scopes_to_session_project() {
        let engine = engine_with(AppConfig::default()).await;
        engine.ensure_session("old", Some("/work/app".into()), Origin::Hook).await.unwrap();
        engine
            .record_observation(manual("old", ObservationType::Decision, 0.9, "prefer axum"))
            .await
            .unwrap();

        let start = engine
            .session_start("new", Some("/work/app".into()))
            .await
            .unwrap();
        assert_eq!(start.session.session_key, "new");
        assert!(start.session.is_open());
        assert_eq!(start.context.observations.len(), 1);

        let elsewhere = engine.session_start("other", Some("/work/lib".into())).await.unwrap();
        assert!(elsewhere.context.observations.is_empty());
    }

    #[test]
    fn injected_context_uses_camel_case() {
        let json = serde_json::to_value(InjectedContext::default()).unwrap();
        assert!(json.get("totalTokens").is_some());
        assert!(json.get("contextText").is_some());
    }
}
