//! Distance and fare formulas.
//!
//! All distances are kilometres rounded to three decimals, fares are in the
//! same currency units as [`crate::models::user::User::balance`].

pub mod filter;

pub use filter::{filter_points, MIN_POINT_SEPARATION_METERS};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const RATE_PER_KM: f64 = 2.0;
pub const MINIMUM_FARE: f64 = 5.0;

/// Anything that can be placed on the globe.
pub trait Coordinate {
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;
}

/// Haversine great-circle distance in kilometres, rounded to metres.
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    round_km(EARTH_RADIUS_KM * c)
}

pub fn distance_between(a: &impl Coordinate, b: &impl Coordinate) -> f64 {
    distance(a.lat(), a.lng(), b.lat(), b.lng())
}

/// Polyline length of an ordered sequence of points. Zero for fewer than two.
pub fn path_distance<C: Coordinate>(points: &[C]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: f64 = points
        .windows(2)
        .map(|pair| distance_between(&pair[0], &pair[1]))
        .sum();
    round_km(total)
}

pub fn fare(distance_km: f64) -> f64 {
    (distance_km * RATE_PER_KM).max(MINIMUM_FARE)
}

fn round_km(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
