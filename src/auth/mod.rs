use crate::state::AppState;
use axum::Router;

mod dto;
pub mod error;
pub mod handlers;
mod otp;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
