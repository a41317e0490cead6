//! Progress and catalog endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::{LevelInfo, LevelsResponse, ProgressResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// GET /api/levels
pub async fn levels(State(state): State<AppState>) -> Json<LevelsResponse> {
    let levels = state
        .catalog
        .list_levels()
        .into_iter()
        .map(|level| LevelInfo {
            level,
            items: state.catalog.items_or_empty(level).len(),
        })
        .collect();
    Json(LevelsResponse { levels })
}

/// GET /api/progress
pub async fn overview(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ProgressResponse>> {
    let response = state
        .progress
        .overview(
            auth.user_id,
            &state.catalog,
            state.clock.now(),
            state.pets.today(),
        )
        .await?;
    Ok(Json(response))
}
