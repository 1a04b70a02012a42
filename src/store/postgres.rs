//! PostgreSQL store backend.
//!
//! Each engine transaction maps onto one `sqlx` transaction. The event row
//! is locked with `SELECT … FOR UPDATE` by [`StoreTransaction::find_event`],
//! which serializes every mutation touching the same event while leaving
//! different events fully concurrent. Child rows reference the event with
//! `ON DELETE CASCADE`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{RegistrationStore, StoreError, StoreTransaction};
use crate::config::ServiceConfig;
use crate::domain::{
    ActiveEntry, AttendeeIdentity, Event, EventId, Registration, RegistrationId,
    RegistrationPatch, RegistrationStatus, WaitlistEntry, WaitlistEntryId,
};

type EventRow = (Uuid, String, i64, i64, DateTime<Utc>, DateTime<Utc>);
type RegistrationRow = (Uuid, Uuid, String, String, DateTime<Utc>, Option<DateTime<Utc>>);
type WaitlistRow = (Uuid, Uuid, String, i64, DateTime<Utc>);

const EVENT_COLUMNS: &str = "id, title, capacity, confirmed_count, created_at, updated_at";
const REGISTRATION_COLUMNS: &str =
    "id, event_id, attendee_identity, status, created_at, cancelled_at";
const WAITLIST_COLUMNS: &str = "id, event_id, attendee_identity, position, created_at";

/// PostgreSQL-backed [`RegistrationStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl RegistrationStore for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(event_from_row).transpose()
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(event_from_row).collect()
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>, StoreError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(registration_from_row).transpose()
    }

    async fn list_registrations(&self, event_id: EventId) -> Result<Vec<Registration>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(*event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(registration_from_row).collect()
    }

    async fn list_waitlist(&self, event_id: EventId) -> Result<Vec<WaitlistEntry>, StoreError> {
        let rows = sqlx::query_as::<_, WaitlistRow>(&format!(
            "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
             WHERE event_id = $1 ORDER BY position ASC"
        ))
        .bind(*event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(waitlist_from_row).collect()
    }
}

/// One `sqlx` transaction. Rolled back by `sqlx` when dropped uncommitted.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}

impl StoreTransaction for PostgresTransaction {
    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(event_from_row).transpose()
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO events (id, title, capacity, confirmed_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.title)
        .bind(i64::from(event.capacity))
        .bind(i64::from(event.confirmed_count))
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_database)?;
        Ok(())
    }

    async fn save_event(&mut self, event: &Event) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE events SET title = $2, capacity = $3, confirmed_count = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.title)
        .bind(i64::from(event.capacity))
        .bind(i64::from(event.confirmed_count))
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("event {} vanished", event.id)));
        }
        Ok(())
    }

    async fn delete_event(&mut self, id: EventId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_registration(
        &mut self,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(registration_from_row).transpose()
    }

    async fn create_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO registrations \
             (id, event_id, attendee_identity, status, created_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*registration.id.as_uuid())
        .bind(*registration.event_id.as_uuid())
        .bind(registration.attendee_identity.as_str())
        .bind(registration.status.as_str())
        .bind(registration.created_at)
        .bind(registration.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_database)?;
        Ok(())
    }

    async fn update_registration(
        &mut self,
        id: RegistrationId,
        patch: RegistrationPatch,
    ) -> Result<Option<Registration>, StoreError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "UPDATE registrations SET status = $2, cancelled_at = $3 WHERE id = $1 \
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(patch.status.as_str())
        .bind(patch.cancelled_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(conflict_or_database)?;
        row.map(registration_from_row).transpose()
    }

    async fn find_active_entry_for_attendee(
        &mut self,
        event_id: EventId,
        attendee: &AttendeeIdentity,
    ) -> Result<Option<ActiveEntry>, StoreError> {
        let registration = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 AND attendee_identity = $2 AND status = 'confirmed' LIMIT 1"
        ))
        .bind(*event_id.as_uuid())
        .bind(attendee.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        if let Some(row) = registration {
            return registration_from_row(row).map(|r| Some(ActiveEntry::Registration(r)));
        }

        let entry = sqlx::query_as::<_, WaitlistRow>(&format!(
            "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
             WHERE event_id = $1 AND attendee_identity = $2 LIMIT 1"
        ))
        .bind(*event_id.as_uuid())
        .bind(attendee.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        entry
            .map(|row| waitlist_from_row(row).map(ActiveEntry::Waitlist))
            .transpose()
    }

    async fn create_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<(), StoreError> {
        let position = i64::try_from(entry.position)
            .map_err(|_| StoreError::Corrupt(format!("position {} out of range", entry.position)))?;
        sqlx::query(
            "INSERT INTO waitlist_entries (id, event_id, attendee_identity, position, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.event_id.as_uuid())
        .bind(entry.attendee_identity.as_str())
        .bind(position)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_database)?;
        Ok(())
    }

    async fn find_waitlist_entry(
        &mut self,
        id: WaitlistEntryId,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        let row = sqlx::query_as::<_, WaitlistRow>(&format!(
            "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(waitlist_from_row).transpose()
    }

    async fn delete_waitlist_entry(&mut self, id: WaitlistEntryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM waitlist_entries WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_lowest_position_waitlist_entry(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        let row = sqlx::query_as::<_, WaitlistRow>(&format!(
            "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
             WHERE event_id = $1 ORDER BY position ASC LIMIT 1"
        ))
        .bind(*event_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(waitlist_from_row).transpose()
    }

    async fn max_waitlist_position(&mut self, event_id: EventId) -> Result<Option<u64>, StoreError> {
        let max = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(position) FROM waitlist_entries WHERE event_id = $1",
        )
        .bind(*event_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        max.map(|p| {
            u64::try_from(p).map_err(|_| StoreError::Corrupt(format!("negative position {p}")))
        })
        .transpose()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation to [`StoreError::Conflict`].
fn conflict_or_database(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn to_u32(value: i64, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

fn attendee_from_column(raw: &str) -> Result<AttendeeIdentity, StoreError> {
    AttendeeIdentity::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn event_from_row(row: EventRow) -> Result<Event, StoreError> {
    let (id, title, capacity, confirmed_count, created_at, updated_at) = row;
    Ok(Event {
        id: EventId::from_uuid(id),
        title,
        capacity: to_u32(capacity, "capacity")?,
        confirmed_count: to_u32(confirmed_count, "confirmed_count")?,
        created_at,
        updated_at,
    })
}

fn registration_from_row(row: RegistrationRow) -> Result<Registration, StoreError> {
    let (id, event_id, attendee, status, created_at, cancelled_at) = row;
    let status = RegistrationStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown registration status: {status}")))?;
    Ok(Registration {
        id: RegistrationId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        attendee_identity: attendee_from_column(&attendee)?,
        status,
        created_at,
        cancelled_at,
    })
}

fn waitlist_from_row(row: WaitlistRow) -> Result<WaitlistEntry, StoreError> {
    let (id, event_id, attendee, position, created_at) = row;
    Ok(WaitlistEntry {
        id: WaitlistEntryId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        attendee_identity: attendee_from_column(&attendee)?,
        position: u64::try_from(position)
            .map_err(|_| StoreError::Corrupt(format!("negative position {position}")))?,
        created_at,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_row_maps_to_domain() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let event = event_from_row((id, "Gala".to_string(), 100, 42, now, now));
        let Ok(event) = event else {
            panic!("row must map");
        };
        assert_eq!(*event.id.as_uuid(), id);
        assert_eq!(event.capacity, 100);
        assert_eq!(event.confirmed_count, 42);
    }

    #[test]
    fn negative_counts_are_corrupt() {
        let now = Utc::now();
        let result = event_from_row((Uuid::new_v4(), "Gala".to_string(), -1, 0, now, now));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let now = Utc::now();
        let row = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "a@example.org".to_string(),
            "pending".to_string(),
            now,
            None,
        );
        assert!(matches!(registration_from_row(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn waitlist_row_maps_position() {
        let now = Utc::now();
        let row = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "b@example.org".to_string(),
            7,
            now,
        );
        assert_eq!(waitlist_from_row(row).ok().map(|w| w.position), Some(7));
    }
}
