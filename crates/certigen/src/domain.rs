use chrono::{DateTime, Utc};
use core::fmt;
use sha2::{Digest, Sha256};

macro_rules! row_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(EventId, "Store-assigned identity of an [`Event`].");
row_id!(ParticipantId, "Store-assigned identity of a [`Participant`].");

/// An event that participants complete. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub organizer: String,
    pub created_at: DateTime<Utc>,
}

/// A roster entry awaiting insertion. The identifier is already encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub full_name: String,
    pub encrypted_identifier: String,
}

/// A participant of exactly one event.
///
/// `fingerprint` and `generated_at` are `None` while the participant is
/// pending and are set together, once, when its certificate is persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub event_id: EventId,
    pub full_name: String,
    pub encrypted_identifier: String,
    pub fingerprint: Option<Fingerprint>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn is_pending(&self) -> bool {
        self.fingerprint.is_none()
    }
}

// Keeps the ciphertext out of logs and panic messages.
impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("event_id", &self.event_id)
            .field("full_name", &self.full_name)
            .field("encrypted_identifier", &"<redacted>")
            .field("fingerprint", &self.fingerprint)
            .field("generated_at", &self.generated_at)
            .finish()
    }
}

/// Lowercase hex SHA-256 digest of a generated artifact.
///
/// Its presence on a participant means "already generated"; its value lets
/// anyone holding the file check it was not altered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// Hashes artifact bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Accepts a stored fingerprint if it is 64 lowercase hex characters.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let well_formed = value.len() == Self::HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then_some(Self(value))
    }

    /// Recomputes the digest of `bytes` and compares.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        *self == Self::of(bytes)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
