use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{error::AppError, services::ledger::UserOverview, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/:user_id", get(user_overview))
}

async fn user_overview(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserOverview>, AppError> {
    let user_id = state.identity.resolve(&user_id)?;
    Ok(Json(state.ledger.user_overview(&user_id).await?))
}
