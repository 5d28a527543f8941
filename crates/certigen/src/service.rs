//! The two command entry points: roster ingestion and certificate generation.

use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::cipher::PiiCipher;
use crate::domain::{Event, EventId, NewParticipant};
use crate::error::{Error, IngestionError, Result};
use crate::pipeline::{GenerationPipeline, GenerationSummary, PipelineConfig};
use crate::render::DocumentRenderer;
use crate::roster::{RosterEntry, read_roster_file};
use crate::secrets::SecretProvider;
use crate::signer::IntegritySigner;
use crate::store::ParticipantStore;
use crate::time::{SystemClock, TimeSource};

/// Wires a store, the crypto primitives and a renderer together.
pub struct CertificateService<S, R, T = SystemClock> {
    cipher: PiiCipher,
    pipeline: GenerationPipeline<S, R, T>,
}

impl<S, R> CertificateService<S, R, SystemClock>
where
    S: ParticipantStore,
    R: DocumentRenderer + 'static,
{
    /// Resolves both keys from `secrets` and builds the service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Secret`] if a key is missing or malformed.
    pub fn from_secrets<P: SecretProvider>(
        store: S,
        renderer: Arc<R>,
        secrets: &P,
        config: PipelineConfig,
    ) -> Result<Self> {
        let cipher = PiiCipher::new(&secrets.cipher_key()?);
        let signer = IntegritySigner::new(secrets.signing_key()?);
        Ok(Self::new(store, cipher, signer, renderer, config))
    }

    pub fn new(
        store: S,
        cipher: PiiCipher,
        signer: IntegritySigner,
        renderer: Arc<R>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cipher: cipher.clone(),
            pipeline: GenerationPipeline::new(store, cipher, signer, renderer, config),
        }
    }
}

impl<S, R, T> CertificateService<S, R, T>
where
    S: ParticipantStore,
    R: DocumentRenderer + 'static,
    T: TimeSource,
{
    /// Replaces the clock used during generation.
    pub fn with_clock<U: TimeSource>(self, clock: U) -> CertificateService<S, R, U> {
        CertificateService {
            cipher: self.cipher,
            pipeline: self.pipeline.with_clock(clock),
        }
    }

    pub fn store(&self) -> &S {
        self.pipeline.store()
    }

    /// Creates an event from a roster file. See [`ingest_roster`].
    pub fn ingest_roster(
        &self,
        name: &str,
        organizer: &str,
        roster: impl AsRef<Path>,
    ) -> Result<Event> {
        ingest_roster(self.store(), &self.cipher, name, organizer, roster)
    }

    /// Creates an event from already parsed entries. See [`ingest_entries`].
    pub fn ingest_entries(
        &self,
        name: &str,
        organizer: &str,
        entries: &[RosterEntry],
    ) -> Result<Event> {
        ingest_entries(self.store(), &self.cipher, name, organizer, entries)
    }

    /// Generates certificates for every pending participant of `event_id`.
    ///
    /// See [`GenerationPipeline::run`].
    pub fn generate_pending(&self, event_id: EventId) -> Result<GenerationSummary> {
        self.pipeline.run(event_id)
    }
}

/// Creates an event from a roster file.
///
/// Every identifier is encrypted before anything is written, and the event
/// and its participants are persisted in one atomic step.
///
/// # Errors
///
/// - [`Error::Validation`] if `name` or `organizer` is blank.
/// - [`Error::Ingestion`] if the roster is unreadable, malformed, or an
///   identifier fails to encrypt.
/// - [`Error::Store`] if the event could not be persisted.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(store, cipher, roster)))]
pub fn ingest_roster<S: ParticipantStore + ?Sized>(
    store: &S,
    cipher: &PiiCipher,
    name: &str,
    organizer: &str,
    roster: impl AsRef<Path>,
) -> Result<Event> {
    let (name, organizer) = event_header(name, organizer)?;
    let entries = read_roster_file(roster)?;
    ingest_entries(store, cipher, name, organizer, &entries)
}

/// Creates an event from already parsed roster entries.
pub fn ingest_entries<S: ParticipantStore + ?Sized>(
    store: &S,
    cipher: &PiiCipher,
    name: &str,
    organizer: &str,
    entries: &[RosterEntry],
) -> Result<Event> {
    let (name, organizer) = event_header(name, organizer)?;
    let roster = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let encrypted_identifier =
                cipher
                    .encrypt(&entry.identifier)
                    .map_err(|source| IngestionError::Encrypt {
                        row: index + 2,
                        source,
                    })?;
            Ok(NewParticipant {
                full_name: entry.full_name.clone(),
                encrypted_identifier,
            })
        })
        .collect::<Result<Vec<_>, IngestionError>>()?;

    let event = store.create_event(name, organizer, &roster)?;
    #[cfg(feature = "tracing")]
    tracing::info!(
        event = %event.id,
        participants = roster.len(),
        "Event '{}' created",
        event.name
    );
    Ok(event)
}

fn event_header<'a>(name: &'a str, organizer: &'a str) -> Result<(&'a str, &'a str)> {
    let (name, organizer) = (name.trim(), organizer.trim());
    if name.is_empty() {
        return Err(Error::validation("event name is required"));
    }
    if organizer.is_empty() {
        return Err(Error::validation("organizer is required"));
    }
    Ok((name, organizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TemplateRenderer;
    use crate::secrets::{SecretKey, StaticSecrets};
    use crate::store::MemoryStore;

    fn service() -> CertificateService<MemoryStore, TemplateRenderer> {
        let secrets = StaticSecrets::new(
            SecretKey::from_bytes([1; 32]),
            SecretKey::from_bytes([2; 32]),
        );
        let renderer = Arc::new(TemplateRenderer::new("{{FULL_NAME}}{{QRCODE}}", "svg").unwrap());
        CertificateService::from_secrets(
            MemoryStore::new(),
            renderer,
            &secrets,
            PipelineConfig::default(),
        )
        .unwrap()
    }

    fn entry(name: &str, identifier: &str) -> RosterEntry {
        RosterEntry {
            full_name: name.into(),
            identifier: identifier.into(),
        }
    }

    #[test]
    fn blank_event_fields_are_rejected_before_reading() {
        let service = service();
        assert!(matches!(
            service.ingest_roster("  ", "Dept X", "/not/read.csv"),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            service.ingest_roster("Workshop", "", "/not/read.csv"),
            Err(Error::Validation { .. })
        ));
        assert!(service.store().events().unwrap().is_empty());
    }

    #[test]
    fn missing_roster_persists_nothing() {
        let service = service();
        assert!(matches!(
            service.ingest_roster("Workshop", "Dept X", "/not/here.csv"),
            Err(Error::Ingestion(IngestionError::Csv(_)))
        ));
        assert!(service.store().events().unwrap().is_empty());
    }

    #[test]
    fn identifiers_are_stored_encrypted() {
        let service = service();
        let event = service
            .ingest_entries("Workshop", "Dept X", &[entry("Alice", "11111111111")])
            .unwrap();
        let participants = service.store().participants(event.id).unwrap();

        assert_eq!(participants.len(), 1);
        assert_ne!(participants[0].encrypted_identifier, "11111111111");
        assert_eq!(
            service.cipher.decrypt(&participants[0].encrypted_identifier).unwrap(),
            "11111111111"
        );
        assert!(participants[0].is_pending());
    }

    #[test]
    fn empty_roster_creates_an_empty_event() {
        let service = service();
        let event = service.ingest_entries("Workshop", "Dept X", &[]).unwrap();
        assert!(service.store().participants(event.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_event_is_a_validation_error() {
        let service = service();
        assert!(matches!(
            service.generate_pending(EventId::new(42)),
            Err(Error::Validation { .. })
        ));
    }
}
