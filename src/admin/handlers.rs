use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::AdminState;
use crate::registry::{GroupInfo, Value, VariableInfo};
use crate::store::stats::StatsSnapshot;
use crate::store::{CommitReport, ConfigError, DiffEntry};

/// Error returned by admin handlers.
#[derive(Debug)]
pub enum ApiError {
    Config(ConfigError),
    SessionNotFound(Uuid),
    Internal(String),
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Config(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Config(e) => {
                let status = match &e {
                    e if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
                    ConfigError::InvalidGroup(_) | ConfigError::InvalidVariable { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    ConfigError::CallbackVeto { .. } => StatusCode::CONFLICT,
                    ConfigError::AllocationFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string())
            }
            ApiError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("unknown session {}", id))
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Body of a set or stage request: a typed value or textual input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SetRequest {
    Typed { value: Value },
    Input { input: String },
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub sessions: usize,
    pub stats: StatsSnapshot,
}

#[derive(Serialize)]
pub struct VariableView {
    pub group: String,
    pub name: String,
    pub generation: u64,
    pub value: Value,
    pub info: VariableInfo,
}

#[derive(Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct Discarded {
    pub discarded: usize,
}

#[derive(Serialize, Deserialize)]
pub struct Staged {
    pub pending: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        sessions: state.sessions.len(),
        stats: state.store.stats_snapshot(),
    })
}

pub async fn list_groups(State(state): State<AdminState>) -> Json<Vec<GroupInfo>> {
    Json(state.store.group_info())
}

pub async fn get_variable(
    State(state): State<AdminState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<VariableView>, ApiError> {
    let handle = state.store.resolve(&group, &name)?;
    let info = state.store.describe(&group, &name)?.info();
    let current = state.store.acquire_current();
    Ok(Json(VariableView {
        group,
        name,
        generation: current.id(),
        value: current.get(handle).clone(),
        info,
    }))
}

/// Immediate single-variable change.
pub async fn set_variable(
    State(state): State<AdminState>,
    Path((group, name)): Path<(String, String)>,
    Json(body): Json<SetRequest>,
) -> Result<Json<CommitReport>, ApiError> {
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || match body {
        SetRequest::Typed { value } => store.set_now(&group, &name, value),
        SetRequest::Input { input } => store.set_now_input(&group, &name, &input),
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(report))
}

pub async fn open_session(State(state): State<AdminState>) -> (StatusCode, Json<SessionCreated>) {
    let id = state.sessions.open(&state.store);
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

pub async fn close_session(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Discarded>, ApiError> {
    let discarded = state.sessions.close(&id).ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(Discarded { discarded }))
}

pub async fn stage_change(
    State(state): State<AdminState>,
    Path((id, group, name)): Path<(Uuid, String, String)>,
    Json(body): Json<SetRequest>,
) -> Result<Json<Staged>, ApiError> {
    let txn = state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    match body {
        SetRequest::Typed { value } => txn.stage(&group, &name, value)?,
        SetRequest::Input { input } => txn.stage_input(&group, &name, &input)?,
    }
    Ok(Json(Staged {
        pending: txn.pending_len(),
    }))
}

pub async fn session_diff(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DiffEntry>>, ApiError> {
    let txn = state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    let entries: Vec<DiffEntry> = txn.diff().collect();
    Ok(Json(entries))
}

pub async fn commit_session(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommitReport>, ApiError> {
    let txn = state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    let report = tokio::task::spawn_blocking(move || txn.commit())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(report))
}

pub async fn rollback_session(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Discarded>, ApiError> {
    let txn = state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(Discarded {
        discarded: txn.rollback(),
    }))
}
