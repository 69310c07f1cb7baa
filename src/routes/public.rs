use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    trips: u64,
    users: u64,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let stats = state.ledger.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        backend: state.ledger.store().backend(),
        trips: stats.trips,
        users: stats.users,
    }))
}
