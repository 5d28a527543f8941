use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::ParticipantStore;
use crate::domain::{Event, EventId, Fingerprint, NewParticipant, Participant, ParticipantId};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    events: BTreeMap<EventId, Event>,
    participants: BTreeMap<ParticipantId, Participant>,
    next_event: i64,
    next_participant: i64,
}

/// In-process [`ParticipantStore`].
///
/// Readers share a read lock; every write takes the write lock, which gives
/// the same single-writer discipline as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, event_id: EventId, pending_only: bool) -> Vec<Participant> {
        self.state
            .read()
            .participants
            .values()
            .filter(|p| p.event_id == event_id && (!pending_only || p.is_pending()))
            .cloned()
            .collect()
    }
}

impl ParticipantStore for MemoryStore {
    fn create_event(
        &self,
        name: &str,
        organizer: &str,
        roster: &[NewParticipant],
    ) -> Result<Event, StoreError> {
        let mut state = self.state.write();

        state.next_event += 1;
        let event = Event {
            id: EventId::new(state.next_event),
            name: name.to_owned(),
            organizer: organizer.to_owned(),
            created_at: Utc::now(),
        };

        for entry in roster {
            state.next_participant += 1;
            let id = ParticipantId::new(state.next_participant);
            state.participants.insert(
                id,
                Participant {
                    id,
                    event_id: event.id,
                    full_name: entry.full_name.clone(),
                    encrypted_identifier: entry.encrypted_identifier.clone(),
                    fingerprint: None,
                    generated_at: None,
                },
            );
        }
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    fn event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state.read().events.get(&event_id).cloned())
    }

    fn events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.state.read().events.values().cloned().collect())
    }

    fn participants(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        Ok(self.select(event_id, false))
    }

    fn claim_pending(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        Ok(self.select(event_id, true))
    }

    fn mark_completed(
        &self,
        participant_id: ParticipantId,
        fingerprint: &Fingerprint,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(StoreError::UnknownParticipant(participant_id))?;
        if !participant.is_pending() {
            return Err(StoreError::NotPending(participant_id));
        }
        participant.fingerprint = Some(fingerprint.clone());
        participant.generated_at = Some(Utc::now());
        Ok(())
    }
}
