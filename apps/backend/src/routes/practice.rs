//! Practice session endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// POST /api/practice/start
pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<TaskView>> {
    let task = state.practice.start(auth.user_id, payload.level).await?;
    Ok(Json(task))
}

/// POST /api/practice/freecare
pub async fn freecare(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<TaskView>> {
    let task = state.practice.start_freecare(auth.user_id).await?;
    Ok(Json(task))
}

/// GET /api/practice/current
pub async fn current(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<TaskView>> {
    let task = state.practice.current(auth.user_id).await?;
    Ok(Json(task))
}

/// POST /api/practice/attempt
pub async fn attempt(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<AttemptRequest>,
) -> Result<Json<AttemptOutcome>> {
    let outcome = state.practice.submit_attempt(auth.user_id, payload).await?;
    Ok(Json(outcome))
}

/// POST /api/practice/care
pub async fn care(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<CareRequest>,
) -> Result<Json<CareOutcome>> {
    let outcome = state
        .practice
        .choose_care(auth.user_id, &payload.action)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/practice/stop
pub async fn stop(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<SessionControlResponse>> {
    Ok(Json(state.practice.stop(auth.user_id).await?))
}

/// POST /api/practice/block
pub async fn block(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<SessionControlResponse>> {
    Ok(Json(state.practice.block(auth.user_id).await?))
}

/// POST /api/practice/unblock
pub async fn unblock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<SessionControlResponse>> {
    Ok(Json(state.practice.unblock(auth.user_id).await?))
}
