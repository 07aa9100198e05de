//! REST API for the memory engine.
//!
//! Endpoints (nested under `/api`):
//!
//! - `GET   /stats`                 : Row counts
//! - `POST  /sessions`              : Get or create a session
//! - `GET   /sessions`              : Recent sessions
//! - `GET   /sessions/{key}`        : One session
//! - `POST  /sessions/{key}/end`    : Close a session
//! - `POST  /observations`          : Record an observation
//! - `GET   /observations`          : Recent observations
//! - `GET   /observations/{id}`     : One observation
//! - `PATCH /observations/{id}`     : Back-fill the summary
//! - `POST  /observations/batch`    : Fetch many by id
//! - `POST  /search`                : Ranked relevance search
//! - `POST  /timeline`              : Chronological window
//! - `GET   /context`               : Context for injection
//! - `POST  /hooks/session-start`   : Open a session and return its context
//! - `POST  /hooks/tool-result`     : Record one tool invocation
//! - `POST  /hooks/session-end`     : Close a session, never 404s

use axum::{
    Router,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use mnemo_core::error::{Error, StoreError};
use mnemo_core::observation::{Observation, ObservationId, ObservationType};
use mnemo_core::session::Session;
use mnemo_core::store::{DEFAULT_SEARCH_LIMIT, SearchQuery, StoreStats};
use mnemo_engine::{
    DEFAULT_LIST_LIMIT, InjectedContext, ObservationInput, Origin, SearchOutcome, SessionStart,
    Timeline,
};

use crate::SharedState;

/// Most ids accepted by one batch fetch.
const MAX_BATCH_IDS: usize = 1_000;

/// Most rows returned by a listing endpoint.
const MAX_LIST_LIMIT: usize = 500;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the API router. Nest this under "/api" in the main router.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/sessions/{key}", get(get_session_handler))
        .route("/sessions/{key}/end", post(end_session_handler))
        .route(
            "/observations",
            post(create_observation_handler).get(list_observations_handler),
        )
        .route("/observations/batch", post(batch_handler))
        .route(
            "/observations/{id}",
            get(get_observation_handler).patch(update_observation_handler),
        )
        .route("/search", post(search_handler))
        .route("/timeline", post(timeline_handler))
        .route("/context", get(context_handler))
        .route("/hooks/session-start", post(session_start_hook))
        .route("/hooks/tool-result", post(tool_result_hook))
        .route("/hooks/session-end", post(session_end_hook))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error rendered as `{ "error": "..." }` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Store(StoreError::QuerySyntax(_)) => StatusCode::BAD_REQUEST,
            Error::Store(StoreError::AlreadyExists { .. })
            | Error::Store(StoreError::ConstraintViolation(_)) => StatusCode::CONFLICT,
            Error::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// A JSON body where an absent body means "all defaults".
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

fn list_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    session_key: String,
    #[serde(default)]
    project_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EndSessionRequest {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionEndHookRequest {
    session_key: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    session_key: Option<String>,
}

/// Body of `POST /observations` and `POST /hooks/tool-result`.
#[derive(Debug, Deserialize)]
struct RecordRequest {
    session_key: String,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default, rename = "type")]
    obs_type: Option<ObservationType>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl RecordRequest {
    fn into_input(self, origin: Origin) -> ObservationInput {
        ObservationInput {
            session_key: self.session_key,
            project_path: self.project_path,
            obs_type: self.obs_type,
            importance: self.importance,
            tool_name: self.tool_name,
            input: self.input,
            output: self.output,
            summary: self.summary,
            origin,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UpdateObservationRequest {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    ids: Vec<ObservationId>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default, rename = "type")]
    obs_type: Option<ObservationType>,
    #[serde(default)]
    since: Option<DateTime<Utc>>,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineRequest {
    #[serde(default)]
    observation_id: Option<ObservationId>,
    #[serde(default)]
    range_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ContextParams {
    project_path: Option<String>,
    max_tokens: Option<usize>,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn stats_handler(State(state): State<SharedState>) -> ApiResult<StoreStats> {
    Ok(Json(state.engine.stats().await?))
}

async fn create_session_handler(
    State(state): State<SharedState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(req) = payload?;
    let session = state
        .engine
        .ensure_session(&req.session_key, req.project_path, Origin::Api)
        .await?;
    Ok(Json(session))
}

async fn list_sessions_handler(
    State(state): State<SharedState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<Session>> {
    let Query(params) = params?;
    Ok(Json(state.engine.recent_sessions(list_limit(params.limit)).await?))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> ApiResult<Session> {
    state
        .engine
        .get_session(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {key}")))
}

async fn end_session_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    payload: Result<Json<EndSessionRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let req = body_or_default(payload)?;
    let success = state.engine.end_session(&key, req.summary).await?;
    Ok(Json(SuccessResponse { success }))
}

async fn create_observation_handler(
    State(state): State<SharedState>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> ApiResult<Observation> {
    let Json(req) = payload?;
    let observation = state
        .engine
        .record_observation(req.into_input(Origin::Api))
        .await?;
    Ok(Json(observation))
}

async fn list_observations_handler(
    State(state): State<SharedState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<Observation>> {
    let Query(params) = params?;
    let observations = state
        .engine
        .list_observations(params.session_key.as_deref(), list_limit(params.limit))
        .await?;
    Ok(Json(observations))
}

async fn get_observation_handler(
    State(state): State<SharedState>,
    Path(id): Path<ObservationId>,
) -> ApiResult<Observation> {
    state
        .engine
        .get_observation(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("observation not found: {id}")))
}

async fn update_observation_handler(
    State(state): State<SharedState>,
    Path(id): Path<ObservationId>,
    payload: Result<Json<UpdateObservationRequest>, JsonRejection>,
) -> ApiResult<Observation> {
    let req = body_or_default(payload)?;
    Ok(Json(state.engine.update_summary(id, req.summary).await?))
}

async fn batch_handler(
    State(state): State<SharedState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Vec<Observation>> {
    let Json(req) = payload?;
    if req.ids.len() > MAX_BATCH_IDS {
        return Err(ApiError::bad_request(format!(
            "at most {MAX_BATCH_IDS} ids per batch"
        )));
    }
    Ok(Json(state.engine.get_observations(&req.ids).await?))
}

async fn search_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchOutcome> {
    let Json(req) = payload?;
    let query = SearchQuery {
        text: req.query,
        obs_type: req.obs_type,
        since: req.since,
        project_path: req.project_path,
        limit: req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    };
    Ok(Json(state.engine.search(&query).await?))
}

async fn timeline_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TimelineRequest>, JsonRejection>,
) -> ApiResult<Timeline> {
    let req = body_or_default(payload)?;
    let center_id = req
        .observation_id
        .ok_or_else(|| ApiError::bad_request("observation_id is required"))?;
    Ok(Json(state.engine.timeline(center_id, req.range_hours).await?))
}

async fn context_handler(
    State(state): State<SharedState>,
    params: Result<Query<ContextParams>, QueryRejection>,
) -> ApiResult<InjectedContext> {
    let Query(params) = params?;
    let context = state
        .engine
        .context_for_injection(params.project_path, params.max_tokens)
        .await?;
    Ok(Json(context))
}

async fn session_start_hook(
    State(state): State<SharedState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<SessionStart> {
    let Json(req) = payload?;
    let start = state
        .engine
        .session_start(&req.session_key, req.project_path)
        .await?;
    Ok(Json(start))
}

async fn tool_result_hook(
    State(state): State<SharedState>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> ApiResult<Observation> {
    let Json(req) = payload?;
    let observation = state
        .engine
        .record_observation(req.into_input(Origin::Hook))
        .await?;
    Ok(Json(observation))
}

async fn session_end_hook(
    State(state): State<SharedState>,
    payload: Result<Json<SessionEndHookRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let Json(req) = payload?;
    let success = match state.engine.end_session(&req.session_key, req.summary).await {
        Ok(ended) => ended,
        Err(Error::Store(StoreError::NotFound { .. })) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(SuccessResponse { success }))
}
