//! In-memory store backend.
//!
//! All data lives behind one [`tokio::sync::Mutex`]. A transaction owns the
//! guard from `begin` until it is committed or dropped, so transactions are
//! fully serialized. Writes are applied in place and the previous value of
//! every touched record is pushed onto an undo log; dropping an uncommitted
//! transaction replays the log in reverse.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{RegistrationStore, StoreError, StoreTransaction};
use crate::domain::{
    ActiveEntry, AttendeeIdentity, Event, EventId, Registration, RegistrationId,
    RegistrationPatch, WaitlistEntry, WaitlistEntryId,
};

#[derive(Debug, Default)]
struct MemoryState {
    events: HashMap<EventId, Event>,
    registrations: HashMap<RegistrationId, Registration>,
    waitlist: HashMap<WaitlistEntryId, WaitlistEntry>,
}

impl MemoryState {
    fn restore(&mut self, undo: Undo) {
        match undo {
            Undo::Event(id, Some(prev)) => {
                self.events.insert(id, prev);
            }
            Undo::Event(id, None) => {
                self.events.remove(&id);
            }
            Undo::Registration(id, Some(prev)) => {
                self.registrations.insert(id, prev);
            }
            Undo::Registration(id, None) => {
                self.registrations.remove(&id);
            }
            Undo::Waitlist(id, Some(prev)) => {
                self.waitlist.insert(id, prev);
            }
            Undo::Waitlist(id, None) => {
                self.waitlist.remove(&id);
            }
        }
    }

    fn registrations_of(&self, event_id: EventId) -> Vec<Registration> {
        let mut out: Vec<Registration> = self
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    fn waitlist_of(&self, event_id: EventId) -> Vec<WaitlistEntry> {
        let mut out: Vec<WaitlistEntry> = self
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id)
            .cloned()
            .collect();
        out.sort_by_key(|w| w.position);
        out
    }
}

/// Previous value of a record touched by a transaction. `None` means the
/// record did not exist before.
#[derive(Debug)]
enum Undo {
    Event(EventId, Option<Event>),
    Registration(RegistrationId, Option<Registration>),
    Waitlist(WaitlistEntryId, Option<WaitlistEntry>),
}

/// In-memory [`RegistrationStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    #[cfg(test)]
    faults: FaultInjector,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `nth` write (1-based) from now fail with
    /// [`StoreError::Unavailable`].
    #[cfg(test)]
    pub(crate) fn fail_nth_write(&self, nth: usize) {
        self.faults.arm(nth);
    }
}

impl RegistrationStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        let state = Arc::clone(&self.state).lock_owned().await;
        Ok(MemoryTransaction {
            state,
            undo: Vec::new(),
            committed: false,
            #[cfg(test)]
            faults: self.faults.clone(),
        })
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state.events.values().cloned().collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>, StoreError> {
        Ok(self.state.lock().await.registrations.get(&id).cloned())
    }

    async fn list_registrations(&self, event_id: EventId) -> Result<Vec<Registration>, StoreError> {
        Ok(self.state.lock().await.registrations_of(event_id))
    }

    async fn list_waitlist(&self, event_id: EventId) -> Result<Vec<WaitlistEntry>, StoreError> {
        Ok(self.state.lock().await.waitlist_of(event_id))
    }
}

/// Transaction over a [`MemoryStore`]. Holds the store lock until dropped.
#[derive(Debug)]
pub struct MemoryTransaction {
    state: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>,
    committed: bool,
    #[cfg(test)]
    faults: FaultInjector,
}

impl MemoryTransaction {
    fn before_write(&self) -> Result<(), StoreError> {
        #[cfg(test)]
        if self.faults.trip() {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(undo) = self.undo.pop() {
            self.state.restore(undo);
        }
    }
}

impl StoreTransaction for MemoryTransaction {
    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state.events.get(&id).cloned())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        self.before_write()?;
        if self.state.events.contains_key(&event.id) {
            return Err(StoreError::Conflict(format!("event {} already exists", event.id)));
        }
        self.state.events.insert(event.id, event.clone());
        self.undo.push(Undo::Event(event.id, None));
        Ok(())
    }

    async fn save_event(&mut self, event: &Event) -> Result<(), StoreError> {
        self.before_write()?;
        let Some(slot) = self.state.events.get_mut(&event.id) else {
            return Err(StoreError::Corrupt(format!("event {} vanished", event.id)));
        };
        let prev = std::mem::replace(slot, event.clone());
        self.undo.push(Undo::Event(event.id, Some(prev)));
        Ok(())
    }

    async fn delete_event(&mut self, id: EventId) -> Result<bool, StoreError> {
        self.before_write()?;
        let Some(prev) = self.state.events.remove(&id) else {
            return Ok(false);
        };
        self.undo.push(Undo::Event(id, Some(prev)));

        let registrations: Vec<RegistrationId> = self
            .state
            .registrations
            .values()
            .filter(|r| r.event_id == id)
            .map(|r| r.id)
            .collect();
        for reg_id in registrations {
            if let Some(prev) = self.state.registrations.remove(&reg_id) {
                self.undo.push(Undo::Registration(reg_id, Some(prev)));
            }
        }

        let entries: Vec<WaitlistEntryId> = self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == id)
            .map(|w| w.id)
            .collect();
        for entry_id in entries {
            if let Some(prev) = self.state.waitlist.remove(&entry_id) {
                self.undo.push(Undo::Waitlist(entry_id, Some(prev)));
            }
        }
        Ok(true)
    }

    async fn find_registration(
        &mut self,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.state.registrations.get(&id).cloned())
    }

    async fn create_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        self.before_write()?;
        let duplicate = registration.is_confirmed()
            && self.state.registrations.values().any(|r| {
                r.event_id == registration.event_id
                    && r.attendee_identity == registration.attendee_identity
                    && r.is_confirmed()
            });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} already confirmed for event {}",
                registration.attendee_identity, registration.event_id
            )));
        }
        self.state
            .registrations
            .insert(registration.id, registration.clone());
        self.undo.push(Undo::Registration(registration.id, None));
        Ok(())
    }

    async fn update_registration(
        &mut self,
        id: RegistrationId,
        patch: RegistrationPatch,
    ) -> Result<Option<Registration>, StoreError> {
        self.before_write()?;
        let Some(slot) = self.state.registrations.get_mut(&id) else {
            return Ok(None);
        };
        let prev = slot.clone();
        patch.apply(slot);
        let updated = slot.clone();
        self.undo.push(Undo::Registration(id, Some(prev)));
        Ok(Some(updated))
    }

    async fn find_active_entry_for_attendee(
        &mut self,
        event_id: EventId,
        attendee: &AttendeeIdentity,
    ) -> Result<Option<ActiveEntry>, StoreError> {
        let registration = self.state.registrations.values().find(|r| {
            r.event_id == event_id && &r.attendee_identity == attendee && r.is_confirmed()
        });
        if let Some(r) = registration {
            return Ok(Some(ActiveEntry::Registration(r.clone())));
        }
        Ok(self
            .state
            .waitlist
            .values()
            .find(|w| w.event_id == event_id && &w.attendee_identity == attendee)
            .cloned()
            .map(ActiveEntry::Waitlist))
    }

    async fn create_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<(), StoreError> {
        self.before_write()?;
        let duplicate = self.state.waitlist.values().any(|w| {
            w.event_id == entry.event_id
                && (w.attendee_identity == entry.attendee_identity || w.position == entry.position)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "waitlist slot for {} on event {} already taken",
                entry.attendee_identity, entry.event_id
            )));
        }
        self.state.waitlist.insert(entry.id, entry.clone());
        self.undo.push(Undo::Waitlist(entry.id, None));
        Ok(())
    }

    async fn find_waitlist_entry(
        &mut self,
        id: WaitlistEntryId,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        Ok(self.state.waitlist.get(&id).cloned())
    }

    async fn delete_waitlist_entry(&mut self, id: WaitlistEntryId) -> Result<bool, StoreError> {
        self.before_write()?;
        let Some(prev) = self.state.waitlist.remove(&id) else {
            return Ok(false);
        };
        self.undo.push(Undo::Waitlist(id, Some(prev)));
        Ok(true)
    }

    async fn find_lowest_position_waitlist_entry(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        Ok(self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id)
            .min_by_key(|w| w.position)
            .cloned())
    }

    async fn max_waitlist_position(&mut self, event_id: EventId) -> Result<Option<u64>, StoreError> {
        Ok(self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id)
            .map(|w| w.position)
            .max())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.committed = true;
        self.undo.clear();
        Ok(())
    }
}

/// Test hook that fails a chosen upcoming write.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
struct FaultInjector {
    remaining: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl FaultInjector {
    fn arm(&self, nth: usize) {
        self.remaining
            .store(nth, std::sync::atomic::Ordering::SeqCst);
    }

    /// Counts down one write; returns `true` when the armed write is reached.
    fn trip(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            == Ok(1)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn attendee(s: &str) -> AttendeeIdentity {
        let Ok(id) = AttendeeIdentity::parse(s) else {
            panic!("valid attendee");
        };
        id
    }

    async fn seeded() -> (MemoryStore, Event) {
        let store = MemoryStore::new();
        let event = Event::new("Workshop".to_string(), 2);
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        assert!(tx.insert_event(&event).await.is_ok());
        assert!(tx.commit().await.is_ok());
        (store, event)
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let (store, event) = seeded().await;
        let Ok(Some(loaded)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(loaded, event);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let (store, event) = seeded().await;
        let reg = Registration::confirmed(event.id, attendee("a@example.org"));
        {
            let Ok(mut tx) = store.begin().await else {
                panic!("begin failed");
            };
            assert!(tx.create_registration(&reg).await.is_ok());
            let mut bumped = event.clone();
            bumped.confirmed_count = 1;
            assert!(tx.save_event(&bumped).await.is_ok());
        }

        let Ok(Some(loaded)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(loaded.confirmed_count, 0);
        assert!(matches!(store.get_registration(reg.id).await, Ok(None)));
    }

    #[tokio::test]
    async fn delete_event_cascades_and_rolls_back() {
        let (store, event) = seeded().await;
        let reg = Registration::confirmed(event.id, attendee("a@example.org"));
        let entry = WaitlistEntry::new(event.id, attendee("b@example.org"), 1);
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        assert!(tx.create_registration(&reg).await.is_ok());
        assert!(tx.create_waitlist_entry(&entry).await.is_ok());
        assert!(tx.commit().await.is_ok());

        {
            let Ok(mut tx) = store.begin().await else {
                panic!("begin failed");
            };
            assert!(matches!(tx.delete_event(event.id).await, Ok(true)));
        }
        assert_eq!(store.list_waitlist(event.id).await.map(|w| w.len()).ok(), Some(1));

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        assert!(matches!(tx.delete_event(event.id).await, Ok(true)));
        assert!(tx.commit().await.is_ok());
        assert!(matches!(store.get_event(event.id).await, Ok(None)));
        assert!(matches!(store.get_registration(reg.id).await, Ok(None)));
        assert_eq!(store.list_waitlist(event.id).await.map(|w| w.len()).ok(), Some(0));
    }

    #[tokio::test]
    async fn waitlist_queries_order_by_position() {
        let (store, event) = seeded().await;
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        for (pos, who) in [(3, "c@example.org"), (1, "a@example.org"), (2, "b@example.org")] {
            let entry = WaitlistEntry::new(event.id, attendee(who), pos);
            assert!(tx.create_waitlist_entry(&entry).await.is_ok());
        }
        let Ok(Some(head)) = tx.find_lowest_position_waitlist_entry(event.id).await else {
            panic!("expected head");
        };
        assert_eq!(head.position, 1);
        assert!(matches!(tx.max_waitlist_position(event.id).await, Ok(Some(3))));
        assert!(tx.commit().await.is_ok());

        let Ok(list) = store.list_waitlist(event.id).await else {
            panic!("list failed");
        };
        let positions: Vec<u64> = list.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_waitlist_attendee_conflicts() {
        let (store, event) = seeded().await;
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let first = WaitlistEntry::new(event.id, attendee("a@example.org"), 1);
        let second = WaitlistEntry::new(event.id, attendee("a@example.org"), 2);
        assert!(tx.create_waitlist_entry(&first).await.is_ok());
        assert!(matches!(
            tx.create_waitlist_entry(&second).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn active_entry_ignores_cancelled_registrations() {
        let (store, event) = seeded().await;
        let who = attendee("a@example.org");
        let reg = Registration::confirmed(event.id, who.clone());
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        assert!(tx.create_registration(&reg).await.is_ok());
        assert!(matches!(
            tx.find_active_entry_for_attendee(event.id, &who).await,
            Ok(Some(ActiveEntry::Registration(_)))
        ));

        let patched = tx
            .update_registration(reg.id, RegistrationPatch::cancel_now())
            .await;
        assert!(matches!(patched, Ok(Some(ref r)) if !r.is_confirmed()));
        assert!(matches!(
            tx.find_active_entry_for_attendee(event.id, &who).await,
            Ok(None)
        ));
    }

    #[tokio::test]
    async fn injected_fault_hits_the_armed_write() {
        let (store, event) = seeded().await;
        store.fail_nth_write(2);
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let first = Registration::confirmed(event.id, attendee("a@example.org"));
        let second = Registration::confirmed(event.id, attendee("b@example.org"));
        assert!(tx.create_registration(&first).await.is_ok());
        assert!(matches!(
            tx.create_registration(&second).await,
            Err(StoreError::Unavailable(_))
        ));
        drop(tx);
        assert!(matches!(store.get_registration(first.id).await, Ok(None)));
    }
}
