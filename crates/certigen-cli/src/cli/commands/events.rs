use certigen::ParticipantStore;

use super::open_store;
use crate::cli::config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let events = store.events()?;
    if events.is_empty() {
        println!("No events");
        return Ok(());
    }

    for event in events {
        println!(
            "{:>6}  {}  {}  ({})",
            event.id,
            event.created_at.format("%Y-%m-%d"),
            event.name,
            event.organizer
        );
    }
    Ok(())
}
