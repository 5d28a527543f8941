//! Persistence of events and participants.
//!
//! The store is the only shared mutable resource of a generation run. Reads
//! (claiming pending work, listing) may run concurrently. Writes go through a
//! single critical section per store, so two workers never interleave a
//! partial update.
//!
//! ## Structure
//!
//! - [`sqlite`] - SQLite-backed store, one writer connection behind a mutex.
//! - [`memory`] - in-process store for tests and dry runs.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::domain::{Event, EventId, Fingerprint, NewParticipant, Participant, ParticipantId};
use crate::error::StoreError;

/// Storage contract consumed by the ingestion and generation entry points.
pub trait ParticipantStore: Send + Sync {
    /// Creates an event together with its roster in one atomic step.
    ///
    /// Either the event and every participant are persisted, or nothing is.
    fn create_event(
        &self,
        name: &str,
        organizer: &str,
        roster: &[NewParticipant],
    ) -> Result<Event, StoreError>;

    /// Looks up a single event.
    fn event(&self, event_id: EventId) -> Result<Option<Event>, StoreError>;

    /// Lists all events, oldest first.
    fn events(&self) -> Result<Vec<Event>, StoreError>;

    /// Lists every participant of an event, pending or not.
    fn participants(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError>;

    /// Returns the participants of `event_id` that have no fingerprint yet.
    ///
    /// Read-only. The order is unspecified.
    fn claim_pending(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError>;

    /// Records a successful generation.
    ///
    /// Serialized across all callers. Fails with [`StoreError::NotPending`] if
    /// the participant already has a fingerprint, so a participant is
    /// completed at most once. Errors are returned, never retried.
    fn mark_completed(
        &self,
        participant_id: ParticipantId,
        fingerprint: &Fingerprint,
    ) -> Result<(), StoreError>;
}

impl<S: ParticipantStore + ?Sized> ParticipantStore for std::sync::Arc<S> {
    fn create_event(
        &self,
        name: &str,
        organizer: &str,
        roster: &[NewParticipant],
    ) -> Result<Event, StoreError> {
        (**self).create_event(name, organizer, roster)
    }

    fn event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        (**self).event(event_id)
    }

    fn events(&self) -> Result<Vec<Event>, StoreError> {
        (**self).events()
    }

    fn participants(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        (**self).participants(event_id)
    }

    fn claim_pending(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        (**self).claim_pending(event_id)
    }

    fn mark_completed(
        &self,
        participant_id: ParticipantId,
        fingerprint: &Fingerprint,
    ) -> Result<(), StoreError> {
        (**self).mark_completed(participant_id, fingerprint)
    }
}
