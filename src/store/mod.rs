//! Persistence gateway: transactional access to events, registrations and
//! waitlist entries.
//!
//! [`RegistrationStore`] is a cheap, cloneable handle constructed once at
//! startup and injected into the engine. Every engine mutation opens a
//! [`StoreTransaction`], performs its reads and writes through it, and
//! commits. Dropping a transaction without committing rolls it back, so a
//! failed operation never leaves a partial write visible.
//!
//! Two backends exist:
//!
//! - [`PostgresStore`]: `sqlx::PgPool`, row lock on the event
//!   (`SELECT … FOR UPDATE`) for the duration of the transaction.
//! - [`MemoryStore`]: a single async mutex held by the transaction, with an
//!   undo log replayed on rollback. Used for development and tests.

pub mod memory;
pub mod postgres;

use std::future::Future;

use crate::domain::{
    ActiveEntry, AttendeeIdentity, Event, EventId, Registration, RegistrationId,
    RegistrationPatch, WaitlistEntry, WaitlistEntryId,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Failure inside the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database driver reported an error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A uniqueness constraint rejected the write.
    #[error("conflicting record: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back into the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend is temporarily unable to serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Handle to a registration data store.
///
/// Read-only queries run directly on the handle; anything that mutates goes
/// through [`RegistrationStore::begin`].
pub trait RegistrationStore: Clone + Send + Sync + 'static {
    /// Transaction type produced by [`RegistrationStore::begin`].
    type Tx: StoreTransaction;

    /// Opens a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Loads an event without locking it.
    fn get_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Lists all events, oldest first.
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send;

    /// Loads a registration by id.
    fn get_registration(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Lists every registration of an event (confirmed and cancelled),
    /// oldest first.
    fn list_registrations(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Registration>, StoreError>> + Send;

    /// Lists the waitlist of an event ordered by position.
    fn list_waitlist(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<WaitlistEntry>, StoreError>> + Send;
}

/// A single unit of work against the store.
///
/// Calls made through one transaction are sequential. [`Self::find_event`]
/// takes an exclusive lock on the event for the rest of the transaction,
/// which is what serializes concurrent registrations for the same event.
pub trait StoreTransaction: Send + Sized {
    /// Loads an event and locks it until commit or rollback.
    fn find_event(
        &mut self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Inserts a new event.
    fn insert_event(&mut self, event: &Event) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites the mutable fields of an existing event (title, capacity,
    /// confirmed count, updated timestamp).
    fn save_event(&mut self, event: &Event) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes an event together with its registrations and waitlist.
    /// Returns `false` if no such event existed.
    fn delete_event(&mut self, id: EventId)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Loads a registration by id.
    fn find_registration(
        &mut self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Inserts a new registration.
    fn create_registration(
        &mut self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Applies a patch to a registration, returning the updated record.
    fn update_registration(
        &mut self,
        id: RegistrationId,
        patch: RegistrationPatch,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Returns the attendee's confirmed registration or waitlist entry for
    /// the event, if any.
    fn find_active_entry_for_attendee(
        &mut self,
        event_id: EventId,
        attendee: &AttendeeIdentity,
    ) -> impl Future<Output = Result<Option<ActiveEntry>, StoreError>> + Send;

    /// Inserts a new waitlist entry.
    fn create_waitlist_entry(
        &mut self,
        entry: &WaitlistEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Loads a waitlist entry by id.
    fn find_waitlist_entry(
        &mut self,
        id: WaitlistEntryId,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>, StoreError>> + Send;

    /// Deletes a waitlist entry. Returns `false` if it did not exist.
    fn delete_waitlist_entry(
        &mut self,
        id: WaitlistEntryId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the entry with the lowest position for the event.
    fn find_lowest_position_waitlist_entry(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>, StoreError>> + Send;

    /// Returns the highest position currently on the event's waitlist.
    fn max_waitlist_position(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<u64>, StoreError>> + Send;

    /// Makes every write of this transaction durable and visible.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
