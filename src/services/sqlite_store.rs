use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        trip::{Trip, TripPatch, TripStatus},
        user::{User, UserPatch},
    },
};

use super::storage::{StoreStats, TripStore};

/// Durable store. Trips are kept as JSON documents next to the columns the
/// lookups filter and sort on.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode(trip: &Trip) -> Result<String, AppError> {
    serde_json::to_string(trip).map_err(|err| AppError::Other(err.into()))
}

fn decode(document: &str) -> Result<Trip, AppError> {
    serde_json::from_str(document).map_err(|err| AppError::Other(err.into()))
}

// Fixed precision keeps lexical order equal to chronological order.
fn sortable(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl TripStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        sqlx::query(
            r#"INSERT INTO trips (id, user_id, status, start_time, end_time, document)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&trip.id)
        .bind(&trip.user_id)
        .bind(trip.status.as_str())
        .bind(sortable(trip.start_time))
        .bind(trip.end_time.map(sortable))
        .bind(encode(&trip)?)
        .execute(&self.pool)
        .await?;
        debug!(trip_id = %trip.id, "trip created in sqlite");
        Ok(trip)
    }

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query("SELECT document FROM trips WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode(&row.try_get::<String, _>("document")?))
            .transpose()
    }

    // Plain autocommit statements: each one waits on the busy timeout for the
    // write lock, where a deferred transaction upgrading from a read would fail
    // at once. Concurrent updates to one trip are last-write-wins.
    async fn update_trip(&self, id: &str, patch: TripPatch) -> Result<Option<Trip>, AppError> {
        let Some(mut trip) = self.get_trip(id).await? else {
            debug!(trip_id = %id, "trip not found for update");
            return Ok(None);
        };
        trip.apply(patch);

        let updated = sqlx::query("UPDATE trips SET status = ?, end_time = ?, document = ? WHERE id = ?")
            .bind(trip.status.as_str())
            .bind(trip.end_time.map(sortable))
            .bind(encode(&trip)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            debug!(trip_id = %id, "trip disappeared before update");
            return Ok(None);
        }
        Ok(Some(trip))
    }

    async fn current_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query(
            "SELECT document FROM trips WHERE user_id = ? AND status = ? ORDER BY start_time DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(TripStatus::Started.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| decode(&row.try_get::<String, _>("document")?))
            .transpose()
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let fresh = User::new_rider(id);
        let inserted = sqlx::query("INSERT OR IGNORE INTO users (id, name, balance) VALUES (?, ?, ?)")
            .bind(&fresh.id)
            .bind(&fresh.name)
            .bind(fresh.balance)
            .execute(&self.pool)
            .await?;
        if inserted.rows_affected() > 0 {
            debug!(user_id = %id, "created new user in sqlite");
        }

        let user = sqlx::query_as::<_, User>("SELECT id, name, balance FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET balance = COALESCE(?, balance)
               WHERE id = ?
               RETURNING id, name, balance"#,
        )
        .bind(patch.balance)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn trip_history(&self, user_id: &str, limit: usize) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(
            "SELECT document FROM trips WHERE user_id = ? AND status = ? ORDER BY end_time DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(TripStatus::Completed.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode(&row.try_get::<String, _>("document")?))
            .collect()
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        let trips: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
            .fetch_one(&self.pool)
            .await?;
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats {
            trips: trips.max(0) as u64,
            users: users.max(0) as u64,
        })
    }
}
