use anyhow::bail;
use certigen::{EventId, ParticipantStore};

use super::open_store;
use crate::cli::config::AppConfig;

pub fn run(config: &AppConfig, event_id: i64) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let event_id = EventId::new(event_id);
    let Some(event) = store.event(event_id)? else {
        bail!("event {event_id} does not exist");
    };

    let participants = store.participants(event_id)?;
    let pending = participants.iter().filter(|p| p.is_pending()).count();
    println!(
        "Event {} '{}' ({}): {} participants, {pending} pending",
        event.id,
        event.name,
        event.organizer,
        participants.len()
    );

    for participant in &participants {
        match (&participant.fingerprint, participant.generated_at) {
            (Some(fingerprint), Some(at)) => println!(
                "{:>8}  completed  {}  {fingerprint}  {}",
                participant.id,
                at.to_rfc3339(),
                participant.full_name
            ),
            _ => println!("{:>8}  pending    {}", participant.id, participant.full_name),
        }
    }
    Ok(())
}
