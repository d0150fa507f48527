use crate::state::AppState;
use axum::Router;

pub mod catalog;
mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
