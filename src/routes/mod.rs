pub mod public;
pub mod trips;
pub mod user;

use axum::{extract::FromRequest, Router};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

/// `axum::Json` whose rejections render as `AppError` JSON bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .merge(public::router())
        .nest("/trips", trips::router())
        .nest("/user", user::router())
}
