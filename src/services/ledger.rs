//! Trip lifecycle and fare settlement.
//!
//! Every operation reads fresh state from the [`TripStore`], checks all of its
//! preconditions, and only then writes. Nothing is cached between calls.
//!
//! Ending a trip takes two writes (complete the trip, then debit the rider).
//! They are not atomic: when the debit fails the trip stays completed and the
//! outcome reports `balance_updated == false`.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    geo::{self, MIN_POINT_SEPARATION_METERS},
    models::{
        location::LocationInput,
        trip::{Trip, TripPatch, TripStatus},
        user::{User, UserPatch},
    },
};

use super::storage::{SharedStore, StoreStats, HISTORY_LIMIT};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsUpdate {
    pub total_distance: f64,
    pub path_points: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndTripOutcome {
    pub trip: Trip,
    pub user_balance: f64,
    pub balance_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub id: String,
    pub name: String,
    pub balance: f64,
    pub current_trip: Option<Trip>,
    pub trip_history: Vec<Trip>,
}

#[derive(Clone)]
pub struct TripLedger {
    store: SharedStore,
}

impl TripLedger {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn start_trip(
        &self,
        user_id: &str,
        location: &LocationInput,
        user_gps: Option<&LocationInput>,
    ) -> Result<Trip, AppError> {
        if let Some(existing) = self.store.current_trip(user_id).await? {
            warn!(user_id, trip_id = %existing.id, "trip already in progress");
            return Err(AppError::TripAlreadyActive {
                trip_id: existing.id,
                status: existing.status,
            });
        }
        let start_location = location.validate()?;

        let mut trip = Trip::start(user_id, start_location);
        trip.user_start_location = user_gps.and_then(|gps| match gps.to_gps_point(Utc::now()) {
            Ok(point) => Some(point),
            Err(_) => {
                debug!(user_id, "ignoring unusable device location at trip start");
                None
            }
        });

        let trip = self.store.create_trip(trip).await?;
        info!(
            user_id,
            trip_id = %trip.id,
            lat = start_location.lat,
            lng = start_location.lng,
            "trip started"
        );
        Ok(trip)
    }

    pub async fn append_gps(
        &self,
        trip_id: &str,
        point: &LocationInput,
    ) -> Result<GpsUpdate, AppError> {
        let trip = self.active_trip(trip_id).await?;
        let now = Utc::now();
        let point = point.to_gps_point(now)?;

        let mut path = trip.gps_path;
        path.push(point);
        let path = geo::filter_points(&path, MIN_POINT_SEPARATION_METERS);
        let total_distance = geo::path_distance(&path);
        let path_points = path.len();

        self.store
            .update_trip(
                trip_id,
                TripPatch {
                    gps_path: Some(path),
                    total_gps_distance: Some(total_distance),
                    last_gps_update: Some(now),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AppError::TripNotFound)?;

        debug!(trip_id, total_distance, path_points, "gps path updated");
        Ok(GpsUpdate {
            total_distance,
            path_points,
        })
    }

    pub async fn end_trip(
        &self,
        trip_id: &str,
        location: &LocationInput,
        user_gps: Option<&LocationInput>,
    ) -> Result<EndTripOutcome, AppError> {
        let trip = self.active_trip(trip_id).await?;
        let end_location = location.validate()?;
        let now = Utc::now();
        let user_end_location = user_gps.and_then(|gps| gps.to_gps_point(now).ok());

        let straight_line_distance = geo::distance_between(&trip.start_location, &end_location);
        let mut final_path = trip.gps_path.clone();
        let distance = match &user_end_location {
            Some(last) if !final_path.is_empty() => {
                final_path.push(last.clone());
                geo::path_distance(&final_path)
            }
            _ => straight_line_distance,
        };
        let fare = geo::fare(distance);
        debug!(
            trip_id,
            straight_line_distance,
            distance,
            gps_points = final_path.len(),
            fare,
            "fare computed"
        );

        let user = self.rider(&trip.user_id).await?;
        if user.balance < fare {
            warn!(
                trip_id,
                user_id = %user.id,
                balance = user.balance,
                fare,
                "insufficient balance"
            );
            return Err(AppError::InsufficientBalance {
                balance: user.balance,
                fare,
            });
        }

        let completed = self
            .store
            .update_trip(
                trip_id,
                TripPatch {
                    status: Some(TripStatus::Completed),
                    gps_path: Some(final_path),
                    total_gps_distance: Some(distance),
                    end_location: Some(end_location),
                    user_end_location,
                    end_time: Some(now),
                    distance: Some(distance),
                    straight_line_distance: Some(straight_line_distance),
                    fare: Some(fare),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| {
                AppError::Persistence(format!("trip {trip_id} vanished during update"))
            })?;
        info!(trip_id, user_id = %user.id, distance, fare, "trip completed");

        let debit = self
            .store
            .update_user(&user.id, UserPatch::balance(user.balance - fare))
            .await;
        let (user_balance, balance_updated) = match debit {
            Ok(Some(updated)) => (updated.balance, true),
            Ok(None) => {
                warn!(trip_id, user_id = %user.id, "user missing at debit, trip completed unpaid");
                (user.balance, false)
            }
            Err(err) => {
                warn!(
                    trip_id,
                    user_id = %user.id,
                    error = %err,
                    "failed to update user balance, trip completed unpaid"
                );
                (user.balance, false)
            }
        };

        Ok(EndTripOutcome {
            trip: completed,
            user_balance,
            balance_updated,
        })
    }

    pub async fn current_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError> {
        self.store.current_trip(user_id).await
    }

    pub async fn trip_history(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        self.store.trip_history(user_id, HISTORY_LIMIT).await
    }

    pub async fn user_overview(&self, user_id: &str) -> Result<UserOverview, AppError> {
        let user = self.rider(user_id).await?;
        let current_trip = self.store.current_trip(user_id).await?;
        let trip_history = self.trip_history(user_id).await?;
        Ok(UserOverview {
            id: user.id,
            name: user.name,
            balance: user.balance,
            current_trip,
            trip_history,
        })
    }

    pub async fn stats(&self) -> Result<StoreStats, AppError> {
        self.store.stats().await
    }

    async fn active_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or(AppError::TripNotFound)?;
        if !trip.is_active() {
            return Err(AppError::TripNotActive {
                trip_id: trip.id,
                status: trip.status,
            });
        }
        Ok(trip)
    }

    async fn rider(&self, user_id: &str) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::services::{memory_store::MemoryStore, storage::TripStore};

    const STOP_A: (f64, f64) = (15.2993, 74.1240);
    const STOP_B: (f64, f64) = (15.3173, 74.1240);

    fn ledger() -> (TripLedger, MemoryStore) {
        let store = MemoryStore::new();
        (TripLedger::new(Arc::new(store.clone())), store)
    }

    fn at((lat, lng): (f64, f64)) -> LocationInput {
        LocationInput::new(lat, lng)
    }

    #[tokio::test]
    async fn start_creates_an_empty_started_trip() {
        let (ledger, store) = ledger();
        let trip = ledger
            .start_trip("rider-1", &at(STOP_A), Some(&at((15.2994, 74.1241))))
            .await
            .unwrap();

        assert_eq!(trip.status, TripStatus::Started);
        assert!(trip.gps_path.is_empty());
        assert_eq!(trip.total_gps_distance, 0.0);
        assert!(trip.user_start_location.is_some());
        assert_eq!(store.get_trip(&trip.id).await.unwrap(), Some(trip));
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_creating_a_trip() {
        let (ledger, store) = ledger();
        let first = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let err = ledger
            .start_trip("rider-1", &at(STOP_B), None)
            .await
            .unwrap_err();
        match err {
            AppError::TripAlreadyActive { trip_id, status } => {
                assert_eq!(trip_id, first.id);
                assert_eq!(status, TripStatus::Started);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.stats().await.unwrap().trips, 1);
    }

    #[tokio::test]
    async fn start_rejects_invalid_location() {
        let (ledger, store) = ledger();
        let err = ledger
            .start_trip("rider-1", &LocationInput::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidLocation));
        assert_eq!(store.stats().await.unwrap().trips, 0);
    }

    #[tokio::test]
    async fn gps_updates_filter_jitter() {
        let (ledger, _) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        ledger.append_gps(&trip.id, &at(STOP_A)).await.unwrap();
        let jitter = ledger
            .append_gps(&trip.id, &at((15.29932, 74.1240)))
            .await
            .unwrap();
        assert_eq!(jitter.path_points, 1);
        assert_eq!(jitter.total_distance, 0.0);

        let moved = ledger.append_gps(&trip.id, &at(STOP_B)).await.unwrap();
        assert_eq!(moved.path_points, 2);
        assert_eq!(moved.total_distance, geo::distance(15.2993, 74.1240, 15.3173, 74.1240));
    }

    #[tokio::test]
    async fn gps_update_on_unknown_or_completed_trip_is_rejected() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.append_gps("missing", &at(STOP_A)).await,
            Err(AppError::TripNotFound)
        ));

        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();
        ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();
        assert!(matches!(
            ledger.append_gps(&trip.id, &at(STOP_B)).await,
            Err(AppError::TripNotActive {
                status: TripStatus::Completed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn end_without_gps_charges_straight_line() {
        let (ledger, store) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let outcome = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();
        let ended = &outcome.trip;

        assert_eq!(ended.status, TripStatus::Completed);
        assert_eq!(ended.distance, ended.straight_line_distance);
        let distance = ended.distance.unwrap();
        assert!((distance - 2.0).abs() < 0.01, "got {distance}");
        assert_eq!(ended.fare, Some(5.0));
        assert_eq!(outcome.user_balance, 495.0);
        assert!(outcome.balance_updated);
        assert_eq!(store.get_user("rider-1").await.unwrap().unwrap().balance, 495.0);
    }

    #[tokio::test]
    async fn device_location_without_recorded_path_still_uses_straight_line() {
        let (ledger, _) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let outcome = ledger
            .end_trip(&trip.id, &at(STOP_B), Some(&at((15.4, 74.2))))
            .await
            .unwrap();
        assert_eq!(outcome.trip.distance, outcome.trip.straight_line_distance);
        assert!(outcome.trip.user_end_location.is_some());
        assert!(outcome.trip.gps_path.is_empty());
    }

    #[tokio::test]
    async fn end_prefers_recorded_path_over_straight_line() {
        let (ledger, _) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();
        for point in [STOP_A, (15.2993, 74.1420), (15.3173, 74.1420)] {
            ledger.append_gps(&trip.id, &at(point)).await.unwrap();
        }

        let outcome = ledger
            .end_trip(&trip.id, &at(STOP_B), Some(&at(STOP_B)))
            .await
            .unwrap();
        let ended = outcome.trip;

        let distance = ended.distance.unwrap();
        let straight = ended.straight_line_distance.unwrap();
        assert_eq!(ended.gps_path.len(), 4);
        assert_eq!(distance, geo::path_distance(&ended.gps_path));
        assert!(distance > straight + 3.0);
        assert_eq!(ended.total_gps_distance, distance);
        assert_eq!(ended.fare, Some(geo::fare(distance)));
        assert!((outcome.user_balance - (500.0 - distance * 2.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_trip_and_balance_untouched() {
        let (ledger, store) = ledger();
        store.get_user("rider-1").await.unwrap();
        store
            .update_user("rider-1", UserPatch::balance(3.0))
            .await
            .unwrap();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let err = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance { balance, fare } if balance == 3.0 && fare == 5.0
        ));
        assert_eq!(store.get_trip(&trip.id).await.unwrap(), Some(trip));
        assert_eq!(store.get_user("rider-1").await.unwrap().unwrap().balance, 3.0);
    }

    #[tokio::test]
    async fn end_checks_trip_state_before_location() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.end_trip("missing", &LocationInput::default(), None).await,
            Err(AppError::TripNotFound)
        ));

        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();
        assert!(matches!(
            ledger.end_trip(&trip.id, &LocationInput::default(), None).await,
            Err(AppError::InvalidLocation)
        ));

        ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();
        assert!(matches!(
            ledger.end_trip(&trip.id, &LocationInput::default(), None).await,
            Err(AppError::TripNotActive { .. })
        ));
    }

    #[tokio::test]
    async fn completed_trip_frees_rider_for_a_new_one() {
        let (ledger, _) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();
        ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();

        let next = ledger.start_trip("rider-1", &at(STOP_B), None).await.unwrap();
        let overview = ledger.user_overview("rider-1").await.unwrap();
        assert_eq!(overview.current_trip.map(|t| t.id), Some(next.id));
        assert_eq!(overview.trip_history.len(), 1);
        assert_eq!(overview.balance, 495.0);
    }

    /// Memory store with switchable faults.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        hide_users: AtomicBool,
        drop_completions: AtomicBool,
        fail_user_updates: AtomicBool,
        user_updates: AtomicUsize,
    }

    impl FaultyStore {
        fn over(inner: &MemoryStore) -> Arc<Self> {
            Arc::new(Self {
                inner: inner.clone(),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl TripStore for FaultyStore {
        fn backend(&self) -> &'static str {
            "faulty"
        }
        async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError> {
            self.inner.create_trip(trip).await
        }
        async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
            self.inner.get_trip(id).await
        }
        async fn update_trip(&self, id: &str, patch: TripPatch) -> Result<Option<Trip>, AppError> {
            if patch.status == Some(TripStatus::Completed)
                && self.drop_completions.load(Ordering::SeqCst)
            {
                return Ok(None);
            }
            self.inner.update_trip(id, patch).await
        }
        async fn current_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError> {
            self.inner.current_trip(user_id).await
        }
        async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
            if self.hide_users.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_user(id).await
        }
        async fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, AppError> {
            self.user_updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_user_updates.load(Ordering::SeqCst) {
                return Err(AppError::Persistence("user collection unavailable".into()));
            }
            self.inner.update_user(id, patch).await
        }
        async fn trip_history(&self, user_id: &str, limit: usize) -> Result<Vec<Trip>, AppError> {
            self.inner.trip_history(user_id, limit).await
        }
        async fn stats(&self) -> Result<StoreStats, AppError> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn failed_debit_still_completes_the_trip() {
        let inner = MemoryStore::new();
        let store = FaultyStore::over(&inner);
        store.fail_user_updates.store(true, Ordering::SeqCst);
        let ledger = TripLedger::new(store.clone());
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let outcome = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();
        assert_eq!(outcome.trip.status, TripStatus::Completed);
        assert!(!outcome.balance_updated);
        assert_eq!(outcome.user_balance, 500.0);
        assert_eq!(inner.get_user("rider-1").await.unwrap().unwrap().balance, 500.0);
    }

    #[tokio::test]
    async fn end_without_a_readable_rider_leaves_the_trip_open() {
        let inner = MemoryStore::new();
        let store = FaultyStore::over(&inner);
        let ledger = TripLedger::new(store.clone());
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        store.hide_users.store(true, Ordering::SeqCst);
        let err = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound), "got {err:?}");

        let stored = inner.get_trip(&trip.id).await.unwrap().expect("trip");
        assert!(stored.is_active());
        assert_eq!(store.user_updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lost_completion_write_is_a_persistence_failure_and_charges_nothing() {
        let inner = MemoryStore::new();
        let store = FaultyStore::over(&inner);
        store.drop_completions.store(true, Ordering::SeqCst);
        let ledger = TripLedger::new(store.clone());
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();

        let err = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)), "got {err:?}");
        assert_eq!(store.user_updates.load(Ordering::SeqCst), 0);
        assert_eq!(inner.get_user("rider-1").await.unwrap().unwrap().balance, 500.0);
        assert!(inner.get_trip(&trip.id).await.unwrap().expect("trip").is_active());
    }

    #[tokio::test]
    async fn recorded_path_without_end_reading_charges_the_straight_line() {
        let (ledger, _) = ledger();
        let trip = ledger.start_trip("rider-1", &at(STOP_A), None).await.unwrap();
        ledger.append_gps(&trip.id, &at(STOP_A)).await.unwrap();
        let detour = ledger
            .append_gps(&trip.id, &at((15.2993, 74.1640)))
            .await
            .unwrap();
        assert_eq!(detour.path_points, 2);

        let outcome = ledger.end_trip(&trip.id, &at(STOP_B), None).await.unwrap();
        let ended = outcome.trip;
        assert_eq!(ended.distance, ended.straight_line_distance);
        assert_ne!(ended.distance, Some(detour.total_distance));
        assert_eq!(ended.gps_path.len(), 2);
        assert!(ended.user_end_location.is_none());
        assert_eq!(ended.fare, Some(5.0));
    }
}
