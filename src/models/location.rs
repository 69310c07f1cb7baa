use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{error::AppError, geo::Coordinate};

/// A validated coordinate pair, e.g. decoded from a bus stop QR code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn stamped(self, timestamp: DateTime<Utc>) -> GpsPoint {
        GpsPoint {
            lat: self.lat,
            lng: self.lng,
            timestamp,
            accuracy: None,
        }
    }
}

impl Coordinate for Location {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lng(&self) -> f64 {
        self.lng
    }
}

/// A timestamped device reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Coordinate for GpsPoint {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lng(&self) -> f64 {
        self.lng
    }
}

/// Untrusted location as it arrives from a client. Numbers and numeric strings
/// are both accepted; ranges are never checked. Deserialization never fails:
/// anything that is not an object becomes an empty (invalid) input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationInput {
    pub lat: Option<Value>,
    pub lng: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<Value>,
}

impl From<Value> for LocationInput {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        Self {
            lat: fields.remove("lat"),
            lng: fields.remove("lng"),
            accuracy: fields.remove("accuracy"),
        }
    }
}

impl<'de> Deserialize<'de> for LocationInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl LocationInput {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: Some(Value::from(lat)),
            lng: Some(Value::from(lng)),
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(Value::from(accuracy));
        self
    }

    pub fn validate(&self) -> Result<Location, AppError> {
        let lat = coerce(self.lat.as_ref()).ok_or(AppError::InvalidLocation)?;
        let lng = coerce(self.lng.as_ref()).ok_or(AppError::InvalidLocation)?;
        Ok(Location { lat, lng })
    }

    pub fn to_gps_point(&self, timestamp: DateTime<Utc>) -> Result<GpsPoint, AppError> {
        let mut point = self.validate()?.stamped(timestamp);
        // accuracy is informational only, an unreadable value is dropped
        point.accuracy = coerce(self.accuracy.as_ref());
        Ok(point)
    }
}

fn coerce(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
