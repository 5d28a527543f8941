use certigen::{
    CertificateService, Error, Event, EventId, FixedClock, IngestionError, ParticipantStore,
    PipelineConfig, SecretKey, SqliteStore, StaticSecrets, TemplateRenderer,
};
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

const ROSTER: &str = "\
full_name,identifier
Alice,11111111111
Bob,22222222222
Carol,33333333333
";

type Service = CertificateService<SqliteStore, TemplateRenderer, FixedClock>;

fn service(dir: &Path) -> Service {
    let store = SqliteStore::open(dir.join("certigen.db")).unwrap();
    let renderer = TemplateRenderer::new(
        "<svg>{{FULL_NAME}} {{IDENTIFIER}} {{EVENT}} {{CERTIFICATE_ID}} {{QRCODE}}</svg>",
        "svg",
    )
    .unwrap();
    let secrets = StaticSecrets::new(
        SecretKey::from_bytes([0xA5; 32]),
        SecretKey::from_bytes([0x5A; 32]),
    );
    let config = PipelineConfig {
        workers: 4,
        output_dir: dir.join("out"),
        ..PipelineConfig::default()
    };
    CertificateService::from_secrets(store, Arc::new(renderer), &secrets, config)
        .unwrap()
        .with_clock(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        ))
}

fn event_dir(dir: &Path, event: EventId) -> PathBuf {
    dir.join("out").join(event.to_string())
}

fn artifacts(dir: &Path, event: EventId) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(event_dir(dir, event))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn modified_times(dir: &Path, event: EventId) -> Vec<SystemTime> {
    artifacts(dir, event)
        .iter()
        .map(|name| {
            let path = event_dir(dir, event).join(name);
            std::fs::metadata(path).unwrap().modified().unwrap()
        })
        .collect()
}

/// Every completed participant's fingerprint matches exactly one file on disk.
fn assert_fingerprints_match_files(service: &Service, dir: &Path, event: &Event) {
    let files: Vec<Vec<u8>> = artifacts(dir, event.id)
        .iter()
        .map(|name| std::fs::read(event_dir(dir, event.id).join(name)).unwrap())
        .collect();
    for participant in service.store().participants(event.id).unwrap() {
        let fingerprint = participant.fingerprint.unwrap();
        let matching = files.iter().filter(|bytes| fingerprint.matches(bytes)).count();
        assert_eq!(matching, 1, "participant {}", participant.id);
    }
}

#[test]
fn roster_to_certificates() {
    let dir = TempDir::new().unwrap();
    let roster = dir.path().join("roster.csv");
    std::fs::write(&roster, ROSTER).unwrap();
    let service = service(dir.path());

    let event = service.ingest_roster("Workshop", "Dept X", &roster).unwrap();
    assert_eq!(event.name, "Workshop");
    assert_eq!(event.organizer, "Dept X");
    assert_eq!(service.store().claim_pending(event.id).unwrap().len(), 3);

    let summary = service.generate_pending(event.id).unwrap();
    assert_eq!(summary.claimed, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.skipped(), 0);

    assert_eq!(
        artifacts(dir.path(), event.id),
        [
            "certificate_11111111111_1.svg",
            "certificate_22222222222_2.svg",
            "certificate_33333333333_3.svg",
        ]
    );

    let participants = service.store().participants(event.id).unwrap();
    let fingerprints: HashSet<&str> = participants
        .iter()
        .map(|p| {
            let fingerprint = p.fingerprint.as_ref().unwrap();
            assert_eq!(fingerprint.as_str().len(), 64);
            assert!(p.generated_at.is_some());
            fingerprint.as_str()
        })
        .collect();
    assert_eq!(fingerprints.len(), 3);

    // A second run finds nothing pending and rewrites nothing.
    let before = modified_times(dir.path(), event.id);
    let again = service.generate_pending(event.id).unwrap();
    assert_eq!(again.claimed, 0);
    assert_eq!(modified_times(dir.path(), event.id), before);
    assert_eq!(service.store().participants(event.id).unwrap(), participants);
}

#[test]
fn completion_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let roster = dir.path().join("roster.csv");
    std::fs::write(&roster, ROSTER).unwrap();

    let event = {
        let service = service(dir.path());
        let event = service.ingest_roster("Workshop", "Dept X", &roster).unwrap();
        service.generate_pending(event.id).unwrap();
        event
    };

    let service = service(dir.path());
    assert!(service.store().claim_pending(event.id).unwrap().is_empty());
    assert_eq!(service.store().events().unwrap(), vec![event]);
}

#[test]
fn malformed_roster_creates_no_event() {
    let dir = TempDir::new().unwrap();
    let roster = dir.path().join("roster.csv");
    std::fs::write(&roster, "full_name,identifier\nAlice,11111111111\nBob\n").unwrap();
    let service = service(dir.path());

    assert!(matches!(
        service.ingest_roster("Workshop", "Dept X", &roster),
        Err(Error::Ingestion(IngestionError::ColumnCount { row: 3, found: 1 }))
    ));
    assert!(service.store().events().unwrap().is_empty());
}

#[test]
fn events_are_independent() {
    let dir = TempDir::new().unwrap();
    let roster = dir.path().join("roster.csv");
    std::fs::write(&roster, ROSTER).unwrap();
    let service = service(dir.path());

    let first = service.ingest_roster("Workshop", "Dept X", &roster).unwrap();
    let second = service.ingest_roster("Seminar", "Dept Y", &roster).unwrap();

    assert_eq!(service.generate_pending(first.id).unwrap().completed, 3);
    assert_eq!(service.store().claim_pending(second.id).unwrap().len(), 3);

    // The same people again under another event must not overwrite the first
    // event's certificates.
    assert_eq!(service.generate_pending(second.id).unwrap().completed, 3);
    assert_eq!(artifacts(dir.path(), first.id).len(), 3);
    assert_eq!(artifacts(dir.path(), second.id).len(), 3);
    assert_fingerprints_match_files(&service, dir.path(), &first);
    assert_fingerprints_match_files(&service, dir.path(), &second);
}
