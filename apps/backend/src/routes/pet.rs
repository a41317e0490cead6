//! Pet endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::{PetView, UpdatePetRequest};
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// GET /api/pet
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<PetView>> {
    let pet = state.pets.load(auth.user_id).await?;
    Ok(Json(state.pets.view(pet)))
}

/// PUT /api/pet
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<UpdatePetRequest>,
) -> Result<Json<PetView>> {
    let view = state
        .pets
        .set_pet_type(auth.user_id, &payload.pet_type)
        .await?;
    Ok(Json(view))
}
