use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::trip::TripStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{}", .0.body_text())]
    JsonBody(#[from] JsonRejection),
    #[error("{0}")]
    BadRequest(String),
    #[error("location must have numeric lat and lng")]
    InvalidLocation,
    #[error("trip already in progress")]
    TripAlreadyActive { trip_id: String, status: TripStatus },
    #[error("trip not found")]
    TripNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("trip is not active")]
    TripNotActive { trip_id: String, status: TripStatus },
    #[error("insufficient balance")]
    InsufficientBalance { balance: f64, fare: f64 },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::JsonBody(rejection) => rejection.status(),
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Other(_)
            | AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_)
            | AppError::InvalidLocation
            | AppError::TripAlreadyActive { .. }
            | AppError::TripNotActive { .. }
            | AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            AppError::TripNotFound | AppError::UserNotFound => StatusCode::NOT_FOUND,
        }
    }

    fn details(&self) -> Map<String, Value> {
        let details = match self {
            AppError::TripAlreadyActive { trip_id, status } => {
                json!({ "tripId": trip_id, "tripStatus": status })
            }
            AppError::TripNotActive { trip_id, status } => {
                json!({ "tripId": trip_id, "currentStatus": status })
            }
            AppError::InsufficientBalance { balance, fare } => {
                json!({ "balance": balance, "fareRequired": fare })
            }
            _ => json!({}),
        };
        match details {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = self.details();
        body.insert("error".into(), Value::String(self.to_string()));
        (status, Json(Value::Object(body))).into_response()
    }
}
