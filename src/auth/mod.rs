use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
mod handlers;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
