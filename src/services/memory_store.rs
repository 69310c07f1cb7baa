use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::AppError,
    models::{
        trip::{Trip, TripPatch, TripStatus},
        user::{User, UserPatch},
    },
};

use super::storage::{StoreStats, TripStore};

#[derive(Default)]
struct Inner {
    trips: Vec<Trip>,
    users: HashMap<String, User>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        let mut inner = self.inner.write().await;
        inner.trips.push(trip.clone());
        debug!(trip_id = %trip.id, "trip created in memory");
        Ok(trip)
    }

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.trips.iter().find(|t| t.id == id).cloned())
    }

    async fn update_trip(&self, id: &str, patch: TripPatch) -> Result<Option<Trip>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(trip) = inner.trips.iter_mut().find(|t| t.id == id) else {
            debug!(trip_id = %id, "trip not found for update");
            return Ok(None);
        };
        trip.apply(patch);
        Ok(Some(trip.clone()))
    }

    async fn current_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .trips
            .iter()
            .find(|t| t.user_id == user_id && t.status == TripStatus::Started)
            .cloned())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.entry(id.to_string()).or_insert_with(|| {
            debug!(user_id = %id, "created new user in memory");
            User::new_rider(id)
        });
        Ok(Some(user.clone()))
    }

    async fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, AppError> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(id).map(|user| {
            user.apply(patch);
            user.clone()
        }))
    }

    async fn trip_history(&self, user_id: &str, limit: usize) -> Result<Vec<Trip>, AppError> {
        let inner = self.inner.read().await;
        let mut history: Vec<Trip> = inner
            .trips
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TripStatus::Completed)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        history.truncate(limit);
        Ok(history)
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        let inner = self.inner.read().await;
        Ok(StoreStats {
            trips: inner.trips.len() as u64,
            users: inner.users.len() as u64,
        })
    }
}
