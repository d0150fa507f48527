use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SocialRegisterRequest},
    oauth,
    services::AuthService,
};
use crate::{
    error::AppError,
    response::{ok, ApiResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/register/google", post(register_social))
        .route("/auth/login", post(login))
        .route("/auth/google/login", get(oauth::google_login))
        .route("/auth/google/callback", get(oauth::google_callback))
}

type Registered = (StatusCode, Json<ApiResponse<RegisterResponse>>);

fn registered(res: RegisterResponse) -> Registered {
    let status = if res.is_new_user {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, ok(res))
}

#[instrument(skip(svc, payload))]
pub async fn register(
    State(svc): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Registered, AppError> {
    let Json(req) = payload?;
    Ok(registered(svc.register(req).await?))
}

#[instrument(skip(svc, payload))]
pub async fn register_social(
    State(svc): State<AuthService>,
    payload: Result<Json<SocialRegisterRequest>, JsonRejection>,
) -> Result<Registered, AppError> {
    let Json(req) = payload?;
    Ok(registered(svc.register_social(req).await?))
}

#[instrument(skip(svc, payload))]
pub async fn login(
    State(svc): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let Json(req) = payload?;
    Ok(ok(svc.login(req).await?))
}
