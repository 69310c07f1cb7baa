use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::{GpsPoint, Location};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripStatus {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "completed")]
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Started => "started",
            TripStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub status: TripStatus,
    pub start_location: Location,
    #[serde(default)]
    pub user_start_location: Option<GpsPoint>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub gps_path: Vec<GpsPoint>,
    #[serde(rename = "totalGPSDistance", default)]
    pub total_gps_distance: f64,
    #[serde(rename = "lastGPSUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_gps_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_end_location: Option<GpsPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub straight_line_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare: Option<f64>,
}

impl Trip {
    pub fn start(user_id: impl Into<String>, start_location: Location) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: TripStatus::Started,
            start_location,
            user_start_location: None,
            start_time: Utc::now(),
            gps_path: Vec::new(),
            total_gps_distance: 0.0,
            last_gps_update: None,
            end_location: None,
            user_end_location: None,
            end_time: None,
            distance: None,
            straight_line_distance: None,
            fare: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Started
    }

    pub fn apply(&mut self, patch: TripPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(gps_path) = patch.gps_path {
            self.gps_path = gps_path;
        }
        if let Some(total) = patch.total_gps_distance {
            self.total_gps_distance = total;
        }
        if let Some(ts) = patch.last_gps_update {
            self.last_gps_update = Some(ts);
        }
        if let Some(end_location) = patch.end_location {
            self.end_location = Some(end_location);
        }
        if let Some(user_end_location) = patch.user_end_location {
            self.user_end_location = Some(user_end_location);
        }
        if let Some(end_time) = patch.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(distance) = patch.distance {
            self.distance = Some(distance);
        }
        if let Some(straight) = patch.straight_line_distance {
            self.straight_line_distance = Some(straight);
        }
        if let Some(fare) = patch.fare {
            self.fare = Some(fare);
        }
    }
}

/// Partial update for a stored trip; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripPatch {
    pub status: Option<TripStatus>,
    pub gps_path: Option<Vec<GpsPoint>>,
    pub total_gps_distance: Option<f64>,
    pub last_gps_update: Option<DateTime<Utc>>,
    pub end_location: Option<Location>,
    pub user_end_location: Option<GpsPoint>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance: Option<f64>,
    pub straight_line_distance: Option<f64>,
    pub fare: Option<f64>,
}
