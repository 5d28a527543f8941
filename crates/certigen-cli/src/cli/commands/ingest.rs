use certigen::{ParticipantStore, PiiCipher, SecretProvider};
use std::path::Path;

use super::open_store;
use crate::cli::config::AppConfig;

pub fn run(config: &AppConfig, name: &str, organizer: &str, roster: &Path) -> anyhow::Result<()> {
    let cipher = PiiCipher::new(&config.keys.cipher_key()?);
    let store = open_store(config)?;
    let event = certigen::ingest_roster(&store, &cipher, name, organizer, roster)?;
    let participants = store.participants(event.id)?.len();

    println!(
        "Created event {} '{}' ({}) with {participants} participants",
        event.id, event.name, event.organizer
    );
    Ok(())
}
