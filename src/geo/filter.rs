use super::{distance_between, Coordinate};

pub const MIN_POINT_SEPARATION_METERS: f64 = 10.0;

/// Drops GPS jitter: a point is kept only when it lies at least
/// `min_distance_meters` from the last kept point. The first point is always
/// kept.
pub fn filter_points<C>(points: &[C], min_distance_meters: f64) -> Vec<C>
where
    C: Coordinate + Clone,
{
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };

    let mut kept = vec![first.clone()];
    for point in rest {
        let last = kept.last().unwrap_or(first);
        if distance_between(last, point) * 1000.0 >= min_distance_meters {
            kept.push(point.clone());
        }
    }
    kept
}
