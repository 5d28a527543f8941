//! One module per subcommand. Results go to stdout, logs to stderr.

mod events;
mod generate;
mod ingest;
mod status;
mod verify;

use anyhow::Context;
use certigen::SqliteStore;

use super::config::{AppConfig, Command};

/// Runs the subcommand selected in `config`.
pub fn dispatch(config: &AppConfig) -> anyhow::Result<()> {
    match &config.command {
        Command::Ingest {
            name,
            organizer,
            roster,
        } => ingest::run(config, name, organizer, roster),
        Command::Generate { event_id } => generate::run(config, *event_id),
        Command::Status { event_id } => status::run(config, *event_id),
        Command::Events => events::run(config),
        Command::Verify { token } => verify::run(config, token),
    }
}

/// Opens the configured database, creating its directory on first use.
fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    SqliteStore::open(&config.database)
        .with_context(|| format!("cannot open database {}", config.database.display()))
}
