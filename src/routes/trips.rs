use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    auth::CurrentRider,
    error::AppError,
    models::{location::LocationInput, trip::Trip},
    routes::ApiJson,
    services::ledger::GpsUpdate,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_trip))
        .route("/update-gps", post(update_gps))
        .route("/end", post(end_trip))
        .route("/current/:user_id", get(current_trip))
        .route("/history/:user_id", get(trip_history))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartTripRequest {
    user_id: Option<String>,
    location: Option<LocationInput>,
    #[serde(rename = "userGPSLocation")]
    user_gps_location: Option<LocationInput>,
}

async fn start_trip(
    State(state): State<AppState>,
    rider: CurrentRider,
    ApiJson(body): ApiJson<StartTripRequest>,
) -> Result<Json<Trip>, AppError> {
    let user_id = rider.require(body.user_id.as_deref(), state.identity.as_ref())?;
    let location = body.location.unwrap_or_default();
    let trip = state
        .ledger
        .start_trip(&user_id, &location, body.user_gps_location.as_ref())
        .await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateGpsRequest {
    trip_id: Option<String>,
    gps_location: Option<LocationInput>,
}

#[derive(Serialize)]
struct UpdateGpsResponse {
    success: bool,
    #[serde(flatten)]
    update: GpsUpdate,
}

async fn update_gps(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpdateGpsRequest>,
) -> Result<Json<UpdateGpsResponse>, AppError> {
    let trip_id = required_trip_id(body.trip_id)?;
    let point = body.gps_location.unwrap_or_default();
    let update = state.ledger.append_gps(&trip_id, &point).await?;
    Ok(Json(UpdateGpsResponse {
        success: true,
        update,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndTripRequest {
    trip_id: Option<String>,
    location: Option<LocationInput>,
    #[serde(rename = "userGPSLocation")]
    user_gps_location: Option<LocationInput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndTripResponse {
    #[serde(flatten)]
    trip: Trip,
    user_balance: f64,
    balance_updated: bool,
}

async fn end_trip(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EndTripRequest>,
) -> Result<Json<EndTripResponse>, AppError> {
    let trip_id = required_trip_id(body.trip_id)?;
    let location = body.location.unwrap_or_default();
    let outcome = state
        .ledger
        .end_trip(&trip_id, &location, body.user_gps_location.as_ref())
        .await?;
    if !outcome.balance_updated {
        warn!(trip_id = %trip_id, "trip completed but balance update failed");
    }
    Ok(Json(EndTripResponse {
        trip: outcome.trip,
        user_balance: outcome.user_balance,
        balance_updated: outcome.balance_updated,
    }))
}

#[derive(Serialize)]
struct CurrentTripResponse {
    trip: Option<Trip>,
}

async fn current_trip(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CurrentTripResponse>, AppError> {
    let user_id = state.identity.resolve(&user_id)?;
    let trip = state.ledger.current_trip(&user_id).await?;
    Ok(Json(CurrentTripResponse { trip }))
}

#[derive(Serialize)]
struct TripHistoryResponse {
    trips: Vec<Trip>,
    total: usize,
}

async fn trip_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<TripHistoryResponse>, AppError> {
    let user_id = state.identity.resolve(&user_id)?;
    let trips = state.ledger.trip_history(&user_id).await?;
    Ok(Json(TripHistoryResponse {
        total: trips.len(),
        trips,
    }))
}

fn required_trip_id(trip_id: Option<String>) -> Result<String, AppError> {
    trip_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing tripId".into()))
}
