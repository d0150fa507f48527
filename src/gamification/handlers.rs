use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::repo_types::{Achievement, UnlockedAchievement};
use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    response::{ok, ApiResponse},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/achievements", get(list_catalog))
        .route("/me/achievements", get(list_mine))
}

#[instrument(skip(state))]
pub async fn list_catalog(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Achievement>>>, AppError> {
    let all = state
        .achievements
        .list()
        .await
        .map_err(|e| AppError::internal("failed to load achievements", e))?;
    Ok(ok(all))
}

#[instrument(skip(state))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<Vec<UnlockedAchievement>>>, AppError> {
    let mine = state
        .achievements
        .list_unlocked(user_id)
        .await
        .map_err(|e| AppError::internal("failed to load achievements", e))?;
    Ok(ok(mine))
}
