use chrono::{DateTime, SecondsFormat, Utc};
use core::time::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

use super::ParticipantStore;
use crate::domain::{Event, EventId, Fingerprint, NewParticipant, Participant, ParticipantId};
use crate::error::StoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        organizer TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS participants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id INTEGER NOT NULL REFERENCES events(id),
        full_name TEXT NOT NULL,
        encrypted_identifier TEXT NOT NULL,
        fingerprint TEXT,
        generated_at TEXT
    );
    CREATE INDEX IF NOT EXISTS participants_pending
        ON participants (event_id, fingerprint);
";

const PARTICIPANT_COLUMNS: &str =
    "id, event_id, full_name, encrypted_identifier, fingerprint, generated_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`ParticipantStore`].
///
/// SQLite permits a single writer at a time, so every write goes through one
/// connection guarded by a [`Mutex`]. A file-backed store serves reads from a
/// fresh read-only connection (WAL mode lets those run alongside the writer).
/// An in-memory store has nowhere else to read from and uses the writer
/// connection for everything.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        // Set before the WAL switch, which takes a lock another process may hold.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Self::init(conn, Some(path))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Participant store ready ({})",
            path.as_deref()
                .map_or_else(|| "in-memory".into(), |p| p.display().to_string())
        );

        Ok(Self {
            writer: Mutex::new(conn),
            path,
        })
    }

    /// Runs a read against a dedicated connection when one can be opened.
    fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &self.path {
            Some(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX
                        | OpenFlags::SQLITE_OPEN_URI,
                )?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                f(&conn)
            }
            None => {
                let conn = self.writer.lock();
                f(&conn)
            }
        }
    }

    fn select_participants(
        conn: &Connection,
        event_id: EventId,
        pending_only: bool,
    ) -> Result<Vec<Participant>, StoreError> {
        let filter = if pending_only {
            "AND fingerprint IS NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE event_id = ?1 {filter} ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![event_id.get()], RawParticipant::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawParticipant::decode).collect()
    }
}

impl ParticipantStore for SqliteStore {
    fn create_event(
        &self,
        name: &str,
        organizer: &str,
        roster: &[NewParticipant],
    ) -> Result<Event, StoreError> {
        let created_at = Utc::now();
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO events (name, organizer, created_at) VALUES (?1, ?2, ?3)",
            params![name, organizer, encode_time(created_at)],
        )?;
        let event_id = EventId::new(tx.last_insert_rowid());

        {
            let mut insert = tx.prepare(
                "INSERT INTO participants (event_id, full_name, encrypted_identifier)
                 VALUES (?1, ?2, ?3)",
            )?;
            for entry in roster {
                insert.execute(params![
                    event_id.get(),
                    entry.full_name,
                    entry.encrypted_identifier
                ])?;
            }
        }
        tx.commit()?;

        Ok(Event {
            id: event_id,
            name: name.to_owned(),
            organizer: organizer.to_owned(),
            created_at,
        })
    }

    fn event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, name, organizer, created_at FROM events WHERE id = ?1",
                params![event_id.get()],
                RawEvent::from_row,
            )
            .optional()?
            .map(RawEvent::decode)
            .transpose()
        })
    }

    fn events(&self) -> Result<Vec<Event>, StoreError> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, organizer, created_at FROM events ORDER BY id")?;
            let rows = stmt
                .query_map([], RawEvent::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(RawEvent::decode).collect()
        })
    }

    fn participants(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        self.read(|conn| Self::select_participants(conn, event_id, false))
    }

    fn claim_pending(&self, event_id: EventId) -> Result<Vec<Participant>, StoreError> {
        self.read(|conn| Self::select_participants(conn, event_id, true))
    }

    fn mark_completed(
        &self,
        participant_id: ParticipantId,
        fingerprint: &Fingerprint,
    ) -> Result<(), StoreError> {
        let conn = self.writer.lock();
        let updated = conn.execute(
            "UPDATE participants SET fingerprint = ?1, generated_at = ?2
             WHERE id = ?3 AND fingerprint IS NULL",
            params![
                fingerprint.as_str(),
                encode_time(Utc::now()),
                participant_id.get()
            ],
        )?;
        if updated == 1 {
            return Ok(());
        }

        let exists = conn
            .query_row(
                "SELECT 1 FROM participants WHERE id = ?1",
                params![participant_id.get()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Err(if exists {
            StoreError::NotPending(participant_id)
        } else {
            StoreError::UnknownParticipant(participant_id)
        })
    }
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            context: format!("{column} ({raw}): {e}"),
        })
}

// Column values as SQLite hands them back, decoded outside the row callback
// so domain validation errors surface as `StoreError` rather than sqlite ones.
struct RawEvent {
    id: i64,
    name: String,
    organizer: String,
    created_at: String,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            organizer: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn decode(self) -> Result<Event, StoreError> {
        Ok(Event {
            id: EventId::new(self.id),
            name: self.name,
            organizer: self.organizer,
            created_at: decode_time(&self.created_at, "events.created_at")?,
        })
    }
}

struct RawParticipant {
    id: i64,
    event_id: i64,
    full_name: String,
    encrypted_identifier: String,
    fingerprint: Option<String>,
    generated_at: Option<String>,
}

impl RawParticipant {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_id: row.get(1)?,
            full_name: row.get(2)?,
            encrypted_identifier: row.get(3)?,
            fingerprint: row.get(4)?,
            generated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Participant, StoreError> {
        let fingerprint = self
            .fingerprint
            .map(|raw| {
                Fingerprint::parse(raw.clone()).ok_or_else(|| StoreError::Corrupt {
                    context: format!("participants.fingerprint ({raw})"),
                })
            })
            .transpose()?;
        let generated_at = self
            .generated_at
            .as_deref()
            .map(|raw| decode_time(raw, "participants.generated_at"))
            .transpose()?;
        Ok(Participant {
            id: ParticipantId::new(self.id),
            event_id: EventId::new(self.event_id),
            full_name: self.full_name,
            encrypted_identifier: self.encrypted_identifier,
            fingerprint,
            generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread::scope;
    use tempfile::TempDir;

    fn roster(n: usize) -> Vec<NewParticipant> {
        (0..n)
            .map(|i| NewParticipant {
                full_name: format!("Participant {i}"),
                encrypted_identifier: format!("{i:04x}"),
            })
            .collect()
    }

    fn file_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("certs.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_event_persists_roster_as_pending() {
        let (_dir, store) = file_store();
        let event = store.create_event("Workshop", "Dept X", &roster(3)).unwrap();

        assert_eq!(store.event(event.id).unwrap(), Some(event.clone()));
        assert_eq!(store.events().unwrap(), vec![event.clone()]);

        let pending = store.claim_pending(event.id).unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|p| p.is_pending() && p.event_id == event.id));
        assert!(pending.iter().all(|p| p.generated_at.is_none()));
    }

    #[test]
    fn unknown_event_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.event(EventId::new(42)).unwrap(), None);
        assert!(store.claim_pending(EventId::new(42)).unwrap().is_empty());
    }

    #[test]
    fn claim_is_scoped_to_the_event() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_event("A", "Org", &roster(2)).unwrap();
        let b = store.create_event("B", "Org", &roster(5)).unwrap();

        assert_eq!(store.claim_pending(a.id).unwrap().len(), 2);
        assert_eq!(store.claim_pending(b.id).unwrap().len(), 5);
    }

    #[test]
    fn mark_completed_is_terminal() {
        let (_dir, store) = file_store();
        let event = store.create_event("Workshop", "Dept X", &roster(2)).unwrap();
        let first = store.claim_pending(event.id).unwrap()[0].id;
        let fp = Fingerprint::of(b"artifact");

        store.mark_completed(first, &fp).unwrap();

        let pending = store.claim_pending(event.id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, first);

        let done = store
            .participants(event.id)
            .unwrap()
            .into_iter()
            .find(|p| p.id == first)
            .unwrap();
        assert_eq!(done.fingerprint, Some(fp.clone()));
        assert!(done.generated_at.is_some());

        assert!(matches!(
            store.mark_completed(first, &Fingerprint::of(b"other")),
            Err(StoreError::NotPending(id)) if id == first
        ));
        assert!(matches!(
            store.mark_completed(ParticipantId::new(999), &fp),
            Err(StoreError::UnknownParticipant(_))
        ));
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        const THREADS: usize = 8;
        const PARTICIPANTS: usize = 400;

        let (_dir, store) = file_store();
        let event = store.create_event("Load", "Org", &roster(PARTICIPANTS)).unwrap();
        let ids: Vec<_> = store
            .claim_pending(event.id)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        let store = Arc::new(store);

        scope(|s| {
            for chunk in ids.chunks(PARTICIPANTS / THREADS) {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for id in chunk {
                        let fp = Fingerprint::of(&id.get().to_le_bytes());
                        store.mark_completed(*id, &fp).unwrap();
                    }
                });
            }
        });

        let all = store.participants(event.id).unwrap();
        assert!(store.claim_pending(event.id).unwrap().is_empty());
        let fingerprints: HashSet<_> = all.iter().filter_map(|p| p.fingerprint.clone()).collect();
        assert_eq!(fingerprints.len(), PARTICIPANTS);
    }

    #[test]
    fn reopening_keeps_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("certs.db");
        let event_id = {
            let store = SqliteStore::open(&path).unwrap();
            store.create_event("Workshop", "Dept X", &roster(1)).unwrap().id
        };
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.claim_pending(event_id).unwrap().len(), 1);
    }

    #[test]
    fn open_waits_for_a_database_locked_elsewhere() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("certs.db");
        let holder = Connection::open(&path).unwrap();
        holder
            .execute_batch("CREATE TABLE held (x); BEGIN EXCLUSIVE; INSERT INTO held VALUES (1);")
            .unwrap();

        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            holder.execute_batch("COMMIT").unwrap();
        });
        let store = SqliteStore::open(&path);
        release.join().unwrap();

        assert!(store.is_ok());
    }
}
