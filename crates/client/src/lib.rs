//! HTTP client for the mnemo worker.
//!
//! Hooks run inside the host agent's main flow, so a missing or slow
//! worker must never become an error there. Every call returns a
//! [`WorkerReply`] and the caller branches on it:
//!
//! - `Ready`: the worker answered
//! - `Rejected`: the worker refused the request (4xx)
//! - `Unavailable`: unreachable, timed out, or failed server-side
//!
//! Requests use a short timeout taken from `[worker] request_timeout_ms`.

use std::time::Duration;

use mnemo_config::WorkerConfig;
use mnemo_core::observation::{Observation, ObservationId, ObservationType};
use mnemo_core::session::Session;
use mnemo_core::store::{SearchQuery, StoreStats};
use mnemo_engine::{InjectedContext, SearchOutcome, SessionStart, Timeline};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Outcome of one worker call.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply<T> {
    Ready(T),
    Rejected { status: u16, message: String },
    Unavailable { reason: String },
}

impl<T> WorkerReply<T> {
    /// The payload, if the worker answered.
    pub fn ok(self) -> Option<T> {
        match self {
            WorkerReply::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WorkerReply::Ready(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, WorkerReply::Unavailable { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WorkerReply<U> {
        match self {
            WorkerReply::Ready(value) => WorkerReply::Ready(f(value)),
            WorkerReply::Rejected { status, message } => WorkerReply::Rejected { status, message },
            WorkerReply::Unavailable { reason } => WorkerReply::Unavailable { reason },
        }
    }

    /// The payload, or `fallback` when memory is not available for this call.
    pub fn unwrap_or(self, fallback: T) -> T {
        self.ok().unwrap_or(fallback)
    }
}

/// `GET /health` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

/// Body for recording an observation or a tool result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordObservation {
    pub session_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub obs_type: Option<ObservationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Deserialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    base_url: String,
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.base_url(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    /// Worker URL for caller-supplied path segments, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid worker URL {}: {e}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| format!("Worker URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> WorkerReply<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Memory worker unreachable");
                return WorkerReply::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            if status.is_client_error() {
                debug!(status = status.as_u16(), %message, "Memory worker rejected request");
                return WorkerReply::Rejected {
                    status: status.as_u16(),
                    message,
                };
            }
            warn!(status = status.as_u16(), %message, "Memory worker failed");
            return WorkerReply::Unavailable { reason: message };
        }

        match response.json::<T>().await {
            Ok(value) => WorkerReply::Ready(value),
            Err(e) => {
                warn!(error = %e, "Malformed memory worker response");
                WorkerReply::Unavailable {
                    reason: format!("Malformed worker response: {e}"),
                }
            }
        }
    }

    /// Like `send`, but a 404 is an answer (`None`) rather than a rejection.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> WorkerReply<Option<T>> {
        match self.send(request).await {
            WorkerReply::Rejected { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
                WorkerReply::Ready(None)
            }
            other => other.map(Some),
        }
    }

    // --- Status ---

    pub async fn health(&self) -> WorkerReply<Health> {
        self.send(self.request(Method::GET, "/health")).await
    }

    pub async fn stats(&self) -> WorkerReply<StoreStats> {
        self.send(self.request(Method::GET, "/api/stats")).await
    }

    // --- Sessions ---

    pub async fn create_session(
        &self,
        session_key: &str,
        project_path: Option<&str>,
    ) -> WorkerReply<Session> {
        let body = json!({ "session_key": session_key, "project_path": project_path });
        self.send(self.request(Method::POST, "/api/sessions").json(&body))
            .await
    }

    pub async fn get_session(&self, session_key: &str) -> WorkerReply<Option<Session>> {
        match self.url(&["api", "sessions", session_key]) {
            Ok(url) => self.send_optional(self.http.get(url)).await,
            Err(reason) => WorkerReply::Unavailable { reason },
        }
    }

    pub async fn recent_sessions(&self, limit: usize) -> WorkerReply<Vec<Session>> {
        let request = self
            .request(Method::GET, "/api/sessions")
            .query(&[("limit", limit)]);
        self.send(request).await
    }

    pub async fn end_session(&self, session_key: &str, summary: Option<&str>) -> WorkerReply<bool> {
        let url = match self.url(&["api", "sessions", session_key, "end"]) {
            Ok(url) => url,
            Err(reason) => return WorkerReply::Unavailable { reason },
        };
        let request = self.http.post(url).json(&json!({ "summary": summary }));
        self.send::<SuccessResponse>(request).await.map(|r| r.success)
    }

    // --- Observations ---

    pub async fn record_observation(&self, body: &RecordObservation) -> WorkerReply<Observation> {
        self.send(self.request(Method::POST, "/api/observations").json(body))
            .await
    }

    pub async fn get_observation(&self, id: ObservationId) -> WorkerReply<Option<Observation>> {
        self.send_optional(self.request(Method::GET, &format!("/api/observations/{id}")))
            .await
    }

    pub async fn get_observations(&self, ids: &[ObservationId]) -> WorkerReply<Vec<Observation>> {
        let request = self
            .request(Method::POST, "/api/observations/batch")
            .json(&json!({ "ids": ids }));
        self.send(request).await
    }

    pub async fn list_observations(
        &self,
        session_key: Option<&str>,
        limit: usize,
    ) -> WorkerReply<Vec<Observation>> {
        let mut request = self
            .request(Method::GET, "/api/observations")
            .query(&[("limit", limit)]);
        if let Some(key) = session_key {
            request = request.query(&[("session_key", key)]);
        }
        self.send(request).await
    }

    pub async fn update_summary(
        &self,
        id: ObservationId,
        summary: Option<&str>,
    ) -> WorkerReply<Observation> {
        let request = self
            .request(Method::PATCH, &format!("/api/observations/{id}"))
            .json(&json!({ "summary": summary }));
        self.send(request).await
    }

    // --- Retrieval ---

    pub async fn search(&self, query: &SearchQuery) -> WorkerReply<SearchOutcome> {
        let body = json!({
            "query": query.text,
            "type": query.obs_type,
            "since": query.since,
            "project_path": query.project_path,
            "limit": query.limit,
        });
        self.send(self.request(Method::POST, "/api/search").json(&body))
            .await
    }

    pub async fn timeline(
        &self,
        observation_id: ObservationId,
        range_hours: Option<f64>,
    ) -> WorkerReply<Timeline> {
        let body = json!({ "observation_id": observation_id, "range_hours": range_hours });
        self.send(self.request(Method::POST, "/api/timeline").json(&body))
            .await
    }

    pub async fn context(
        &self,
        project_path: Option<&str>,
        max_tokens: Option<usize>,
    ) -> WorkerReply<InjectedContext> {
        let mut request = self.request(Method::GET, "/api/context");
        if let Some(project) = project_path {
            request = request.query(&[("project_path", project)]);
        }
        if let Some(max) = max_tokens {
            request = request.query(&[("max_tokens", max)]);
        }
        self.send(request).await
    }

    // --- Hooks ---

    pub async fn session_start(
        &self,
        session_key: &str,
        project_path: Option<&str>,
    ) -> WorkerReply<SessionStart> {
        let body = json!({ "session_key": session_key, "project_path": project_path });
        self.send(self.request(Method::POST, "/api/hooks/session-start").json(&body))
            .await
    }

    pub async fn tool_result(&self, body: &RecordObservation) -> WorkerReply<Observation> {
        self.send(self.request(Method::POST, "/api/hooks/tool-result").json(body))
            .await
    }

    pub async fn session_end(&self, session_key: &str, summary: Option<&str>) -> WorkerReply<bool> {
        let body = json!({ "session_key": session_key, "summary": summary });
        self.send::<SuccessResponse>(self.request(Method::POST, "/api/hooks/session-end").json(&body))
            .await
            .map(|r| r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_helpers() {
        let ready: WorkerReply<u32> = WorkerReply::Ready(3);
        assert!(ready.is_ready());
        assert_eq!(ready.clone().map(|n| n * 2), WorkerReply::Ready(6));
        assert_eq!(ready.ok(), Some(3));

        let down: WorkerReply<u32> = WorkerReply::Unavailable {
            reason: "connection refused".into(),
        };
        assert!(down.is_unavailable());
        assert_eq!(down.unwrap_or(0), 0);

        let rejected: WorkerReply<u32> = WorkerReply::Rejected {
            status: 400,
            message: "bad".into(),
        };
        assert!(!rejected.is_ready() && !rejected.is_unavailable());
    }

    #[test]
    fn session_keys_are_path_safe() {
        let client = WorkerClient::new("http://127.0.0.1:37777/", Duration::from_secs(1)).unwrap();
        let url = |key: &str| client.url(&["api", "sessions", key]).unwrap().to_string();
        assert_eq!(url("s1"), "http://127.0.0.1:37777/api/sessions/s1");
        assert_eq!(url("a/b c"), "http://127.0.0.1:37777/api/sessions/a%2Fb%20c");
        assert_eq!(url("ü"), "http://127.0.0.1:37777/api/sessions/%C3%BC");
        assert_eq!(
            client.url(&["api", "sessions", "a?b", "end"]).unwrap().path(),
            "/api/sessions/a%3Fb/end"
        );

        let prefixed = WorkerClient::new("http://host:1/mnemo", Duration::from_secs(1)).unwrap();
        assert_eq!(
            prefixed.url(&["api", "sessions", "s1"]).unwrap().path(),
            "/mnemo/api/sessions/s1"
        );

        let broken = WorkerClient::new("not a url", Duration::from_secs(1)).unwrap();
        assert!(broken.url(&["health"]).is_err());
    }

    #[test]
    fn record_body_omits_absent_fields() {
        let body = RecordObservation {
            session_key: "s1".into(),
            obs_type: Some(ObservationType::Bugfix),
            ..Default::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, json!({"session_key": "s1", "type": "bugfix"}));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = WorkerClient::new("http://127.0.0.1:37777/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:37777");
    }
}
