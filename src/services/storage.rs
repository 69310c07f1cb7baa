//! Persistence gateway for trips and riders.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{
    config::StoreBackend,
    db,
    error::AppError,
    models::{
        trip::{Trip, TripPatch},
        user::{User, UserPatch},
    },
};

use super::{memory_store::MemoryStore, sqlite_store::SqliteStore};

/// Completed trips returned by [`TripStore::trip_history`].
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub trips: u64,
    pub users: u64,
}

/// Narrow CRUD surface the ledger needs. Implementations hold no ledger logic:
/// they do not check trip status or balances.
///
/// Update methods return `Ok(None)` when the id is unknown.
#[async_trait]
pub trait TripStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError>;

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError>;

    async fn update_trip(&self, id: &str, patch: TripPatch) -> Result<Option<Trip>, AppError>;

    /// The user's trip with status `started`, if any.
    async fn current_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError>;

    /// Looks up a rider, creating it with the starting balance if absent.
    /// `None` means the record could not be read back after creation.
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, AppError>;

    /// Completed trips, most recent end time first, at most `limit`.
    async fn trip_history(&self, user_id: &str, limit: usize) -> Result<Vec<Trip>, AppError>;

    async fn stats(&self) -> Result<StoreStats, AppError>;
}

pub type SharedStore = Arc<dyn TripStore>;

pub async fn open_store(backend: &StoreBackend) -> Result<SharedStore, AppError> {
    let store: SharedStore = match backend {
        StoreBackend::Sqlite { database_url } => {
            let pool = db::init_pool(database_url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(SqliteStore::new(pool))
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = store.backend(), "trip store ready");
    Ok(store)
}
