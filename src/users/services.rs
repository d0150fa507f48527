use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::ProfileResponse;
use super::repo_types::User;
use crate::{
    auth::{
        password::{hash_password, verify_password},
        services::{validate_name, validate_password},
    },
    error::AppError,
    state::AppState,
    store::StoreError,
};

async fn load(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| AppError::internal("failed to load user", e))?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn save(state: &AppState, user: &User) -> Result<(), AppError> {
    match state.users.update(user).await {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound) => Err(AppError::NotFound("User not found".into())),
        Err(e) => Err(AppError::internal("failed to update user", e)),
    }
}

#[instrument(skip(state))]
pub async fn profile(state: &AppState, user_id: Uuid) -> Result<ProfileResponse, AppError> {
    let user = load(state, user_id).await?;
    let achievements = state
        .achievements
        .list_unlocked(user_id)
        .await
        .map_err(|e| AppError::internal("failed to load achievements", e))?;

    Ok(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        avatar_url: user.avatar_url,
        auth_provider: user.auth_provider,
        total_xp: user.xp.total_xp,
        achievements,
        created_at: user.created_at,
    })
}

#[instrument(skip(state))]
pub async fn update_name(state: &AppState, user_id: Uuid, name: &str) -> Result<User, AppError> {
    let name = name.trim();
    validate_name(name, 1)?;
    let mut user = load(state, user_id).await?;
    user.name = name.to_string();
    save(state, &user).await?;
    info!(%user_id, "profile updated");
    Ok(user)
}

#[instrument(skip(state, old_password, new_password))]
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if old_password.is_empty() {
        return Err(AppError::validation("old_password", "Current password is required"));
    }
    validate_password("new_password", new_password)?;

    let mut user = load(state, user_id).await?;
    if !verify_password(old_password, &user.password_hash).unwrap_or(false) {
        warn!(%user_id, "password change with wrong current password");
        return Err(AppError::validation("old_password", "Current password is incorrect"));
    }

    user.password_hash = hash_password(new_password)
        .map_err(|e| AppError::internal("failed to update password", e))?;
    save(state, &user).await?;
    info!(%user_id, "password changed");
    Ok(())
}
