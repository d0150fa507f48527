use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ChangePasswordRequest, MessageResponse, ProfileResponse, UpdateProfileRequest},
    services,
};
use crate::{
    auth::{dto::PublicUser, jwt::AuthUser},
    error::AppError,
    response::{ok, ApiResponse},
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/profile", put(update_profile))
        .route("/me/password", put(change_password))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<ProfileResponse>>, AppError> {
    Ok(ok(services::profile(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let Json(req) = payload?;
    let user = services::update_name(&state, user_id, &req.name).await?;
    Ok(ok(PublicUser::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    let Json(req) = payload?;
    services::change_password(&state, user_id, &req.old_password, &req.new_password).await?;
    Ok(ok(MessageResponse {
        message: "Password updated successfully".into(),
    }))
}
