//! Registration engine: capacity enforcement, waitlisting and promotion.

use chrono::Utc;

use crate::domain::{
    AttendeeIdentity, Cancellation, Event, EventBus, EventId, Registration, RegistrationEvent,
    RegistrationId, RegistrationOutcome, RegistrationPatch, RegistrationStatus, WaitlistEntry,
    WaitlistEntryId,
};
use crate::error::RegistrationError;
use crate::store::{RegistrationStore, StoreError, StoreTransaction};

/// Requested changes to an event. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChanges {
    /// New title.
    pub title: Option<String>,
    /// New capacity.
    pub capacity: Option<u32>,
}

/// Result of [`RegistrationEngine::update_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUpdate {
    /// The event after the update.
    pub event: Event,
    /// Registrations created by promoting waitlisted attendees into the
    /// freed capacity, in promotion order.
    pub promoted: Vec<Registration>,
}

/// Orchestration layer for all registration operations.
///
/// Owns the injected store handle and the [`EventBus`]. Every mutation
/// follows the same pattern: open a transaction → lock the event → check
/// preconditions → write → commit → emit events → return result. Events are
/// only published once the transaction has committed.
#[derive(Debug, Clone)]
pub struct RegistrationEngine<S> {
    store: S,
    event_bus: EventBus,
}

impl<S: RegistrationStore> RegistrationEngine<S> {
    /// Creates a new engine over the given store.
    #[must_use]
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the underlying store handle.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a new event with no registrations.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Storage`] if the store fails.
    pub async fn create_event(
        &self,
        title: String,
        capacity: u32,
    ) -> Result<Event, RegistrationError> {
        let event = Event::new(title, capacity);

        let mut tx = self.store.begin().await?;
        tx.insert_event(&event).await?;
        tx.commit().await?;

        let _ = self.event_bus.publish(RegistrationEvent::EventCreated {
            event_id: event.id,
            title: event.title.clone(),
            capacity: event.capacity,
            timestamp: event.created_at,
        });

        tracing::info!(event_id = %event.id, capacity, "event created");
        Ok(event)
    }

    /// Loads a single event.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist.
    pub async fn get_event(&self, event_id: EventId) -> Result<Event, RegistrationError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound(event_id))
    }

    /// Lists all events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Storage`] if the store fails.
    pub async fn list_events(&self) -> Result<Vec<Event>, RegistrationError> {
        Ok(self.store.list_events().await?)
    }

    /// Changes an event's title and/or capacity.
    ///
    /// Raising the capacity promotes waitlisted attendees, lowest position
    /// first, until the event is full or the waitlist is empty.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] if the event does not exist.
    /// - [`RegistrationError::InvalidState`] if the new capacity is below the
    ///   number of confirmed registrations.
    pub async fn update_event(
        &self,
        event_id: EventId,
        changes: EventChanges,
    ) -> Result<EventUpdate, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let Some(mut event) = tx.find_event(event_id).await? else {
            return Err(RegistrationError::EventNotFound(event_id));
        };

        if let Some(capacity) = changes.capacity {
            if capacity < event.confirmed_count {
                return Err(RegistrationError::InvalidState(format!(
                    "capacity {capacity} is below the {} confirmed registrations of event {event_id}",
                    event.confirmed_count
                )));
            }
            event.capacity = capacity;
        }
        if let Some(title) = changes.title {
            event.title = title;
        }

        let mut promotions = Vec::new();
        while event.has_open_slot() {
            match promote_head(&mut tx, &mut event).await? {
                Some(promotion) => promotions.push(promotion),
                None => break,
            }
        }

        event.updated_at = Utc::now();
        tx.save_event(&event).await?;
        tx.commit().await?;

        let updated = RegistrationEvent::EventUpdated {
            event_id,
            capacity: event.capacity,
            confirmed_count: event.confirmed_count,
            timestamp: event.updated_at,
        };
        let promoted = promotions
            .iter()
            .map(|(entry_id, registration)| RegistrationEvent::promoted(*entry_id, registration));
        let _ = self
            .event_bus
            .publish_all(std::iter::once(updated).chain(promoted));

        tracing::info!(
            %event_id,
            capacity = event.capacity,
            promoted = promotions.len(),
            "event updated"
        );
        Ok(EventUpdate {
            event,
            promoted: promotions.into_iter().map(|(_, r)| r).collect(),
        })
    }

    /// Removes an event together with its registrations and waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist.
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), RegistrationError> {
        let mut tx = self.store.begin().await?;
        if tx.find_event(event_id).await?.is_none() || !tx.delete_event(event_id).await? {
            return Err(RegistrationError::EventNotFound(event_id));
        }
        tx.commit().await?;

        let _ = self.event_bus.publish(RegistrationEvent::EventDeleted {
            event_id,
            timestamp: Utc::now(),
        });

        tracing::info!(%event_id, "event deleted");
        Ok(())
    }

    /// Registers an attendee for an event.
    ///
    /// Inside one transaction holding the event lock: if a seat is free a
    /// confirmed [`Registration`] is created and the confirmed count is
    /// incremented; otherwise a [`WaitlistEntry`] is appended at
    /// `max(position) + 1`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] if the event does not exist.
    /// - [`RegistrationError::DuplicateRegistration`] if the attendee already
    ///   holds a confirmed registration or a waitlist entry for the event.
    /// - [`RegistrationError::Storage`] if the store fails; nothing is
    ///   written in that case.
    pub async fn register(
        &self,
        event_id: EventId,
        attendee: AttendeeIdentity,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let Some(mut event) = tx.find_event(event_id).await? else {
            return Err(RegistrationError::EventNotFound(event_id));
        };

        if tx
            .find_active_entry_for_attendee(event_id, &attendee)
            .await?
            .is_some()
        {
            return Err(RegistrationError::DuplicateRegistration { event_id, attendee });
        }

        let outcome = if event.has_open_slot() {
            let registration = Registration::confirmed(event_id, attendee.clone());
            tx.create_registration(&registration)
                .await
                .map_err(|e| conflict_as_duplicate(e, event_id, &attendee))?;
            event.confirmed_count += 1;
            event.updated_at = Utc::now();
            tx.save_event(&event).await?;
            RegistrationOutcome::Confirmed(registration)
        } else {
            let position = tx
                .max_waitlist_position(event_id)
                .await?
                .map_or(1, |max| max.saturating_add(1));
            let entry = WaitlistEntry::new(event_id, attendee.clone(), position);
            tx.create_waitlist_entry(&entry)
                .await
                .map_err(|e| conflict_as_duplicate(e, event_id, &attendee))?;
            RegistrationOutcome::Waitlisted(entry)
        };
        tx.commit().await?;

        match &outcome {
            RegistrationOutcome::Confirmed(registration) => {
                let _ = self
                    .event_bus
                    .publish(RegistrationEvent::confirmed(registration));
                tracing::info!(
                    %event_id,
                    registration_id = %registration.id,
                    confirmed = event.confirmed_count,
                    capacity = event.capacity,
                    "registration confirmed"
                );
            }
            RegistrationOutcome::Waitlisted(entry) => {
                let _ = self.event_bus.publish(RegistrationEvent::waitlisted(entry));
                tracing::info!(
                    %event_id,
                    waitlist_entry_id = %entry.id,
                    position = entry.position,
                    "event full, attendee waitlisted"
                );
            }
        }
        Ok(outcome)
    }

    /// Cancels a confirmed registration and promotes the head of the
    /// waitlist into the freed seat.
    ///
    /// The confirmed count is decremented and, if a promotion happens,
    /// incremented again, so a cancel with a non-empty waitlist leaves it
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::RegistrationNotFound`] if the id is unknown.
    /// - [`RegistrationError::InvalidState`] if it is already cancelled.
    /// - [`RegistrationError::Storage`] if the store fails; the cancel and
    ///   the promotion are rolled back together.
    pub async fn cancel(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Cancellation, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let Some(existing) = tx.find_registration(registration_id).await? else {
            return Err(RegistrationError::RegistrationNotFound(registration_id));
        };
        let Some(mut event) = tx.find_event(existing.event_id).await? else {
            return Err(RegistrationError::RegistrationNotFound(registration_id));
        };

        // Re-read now that the event is locked.
        let Some(current) = tx.find_registration(registration_id).await? else {
            return Err(RegistrationError::RegistrationNotFound(registration_id));
        };
        if !current.is_confirmed() {
            return Err(RegistrationError::InvalidState(format!(
                "registration {registration_id} is already cancelled"
            )));
        }

        let Some(cancelled) = tx
            .update_registration(registration_id, RegistrationPatch::cancel_now())
            .await?
        else {
            return Err(RegistrationError::RegistrationNotFound(registration_id));
        };
        event.confirmed_count = event.confirmed_count.checked_sub(1).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "event {} has a confirmed registration but a zero count",
                event.id
            ))
        })?;

        let promotion = if event.has_open_slot() {
            promote_head(&mut tx, &mut event).await?
        } else {
            None
        };

        event.updated_at = Utc::now();
        tx.save_event(&event).await?;
        tx.commit().await?;

        let promoted = promotion
            .as_ref()
            .map(|(entry_id, registration)| RegistrationEvent::promoted(*entry_id, registration));
        let _ = self.event_bus.publish_all(
            std::iter::once(RegistrationEvent::cancelled(&cancelled)).chain(promoted),
        );

        tracing::info!(
            event_id = %event.id,
            %registration_id,
            promoted = promotion.is_some(),
            "registration cancelled"
        );
        Ok(Cancellation {
            cancelled,
            promoted: promotion.map(|(_, r)| r),
        })
    }

    /// Removes an attendee from an event's waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::WaitlistEntryNotFound`] if the entry does
    /// not exist.
    pub async fn withdraw(
        &self,
        entry_id: WaitlistEntryId,
    ) -> Result<WaitlistEntry, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let Some(entry) = tx.find_waitlist_entry(entry_id).await? else {
            return Err(RegistrationError::WaitlistEntryNotFound(entry_id));
        };
        if tx.find_event(entry.event_id).await?.is_none()
            || !tx.delete_waitlist_entry(entry_id).await?
        {
            return Err(RegistrationError::WaitlistEntryNotFound(entry_id));
        }
        tx.commit().await?;

        let _ = self.event_bus.publish(RegistrationEvent::withdrawn(&entry));
        tracing::info!(event_id = %entry.event_id, %entry_id, "waitlist entry withdrawn");
        Ok(entry)
    }

    /// Loads a single registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::RegistrationNotFound`] if it does not
    /// exist.
    pub async fn get_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Registration, RegistrationError> {
        self.store
            .get_registration(registration_id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(registration_id))
    }

    /// Lists an event's registrations, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist.
    pub async fn list_registrations(
        &self,
        event_id: EventId,
        status: Option<RegistrationStatus>,
    ) -> Result<Vec<Registration>, RegistrationError> {
        self.get_event(event_id).await?;
        let mut registrations = self.store.list_registrations(event_id).await?;
        if let Some(status) = status {
            registrations.retain(|r| r.status == status);
        }
        Ok(registrations)
    }

    /// Lists an event's waitlist in promotion order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist.
    pub async fn list_waitlist(
        &self,
        event_id: EventId,
    ) -> Result<Vec<WaitlistEntry>, RegistrationError> {
        self.get_event(event_id).await?;
        Ok(self.store.list_waitlist(event_id).await?)
    }
}

/// Moves the lowest-position waitlist entry of `event` into a new confirmed
/// registration. The caller must have checked that a seat is open and must
/// save `event` afterwards.
async fn promote_head<T: StoreTransaction>(
    tx: &mut T,
    event: &mut Event,
) -> Result<Option<(WaitlistEntryId, Registration)>, RegistrationError> {
    let Some(head) = tx.find_lowest_position_waitlist_entry(event.id).await? else {
        return Ok(None);
    };
    if !tx.delete_waitlist_entry(head.id).await? {
        return Err(StoreError::Corrupt(format!("waitlist entry {} vanished", head.id)).into());
    }

    let registration = Registration::confirmed(event.id, head.attendee_identity);
    tx.create_registration(&registration).await?;
    event.confirmed_count += 1;
    Ok(Some((head.id, registration)))
}

/// A uniqueness violation on insert means another active entry for the same
/// attendee slipped in.
fn conflict_as_duplicate(
    err: StoreError,
    event_id: EventId,
    attendee: &AttendeeIdentity,
) -> RegistrationError {
    match err {
        StoreError::Conflict(_) => RegistrationError::DuplicateRegistration {
            event_id,
            attendee: attendee.clone(),
        },
        other => RegistrationError::Storage(other),
    }
}
