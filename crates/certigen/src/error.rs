//! Error types for certificate ingestion and generation.
//!
//! Each concern has its own enum so callers can tell batch-scope failures from
//! per-participant ones. [`Error`] unifies them for the two command entry
//! points in [`crate::service`].
//!
//! ## Error Cases
//! - `Validation`: required inputs are missing or out of range. Fatal.
//! - `Ingestion`: the roster could not be read or is malformed. Fatal, nothing
//!   is persisted.
//! - `Store`: persistence failed. Fatal on reads, per participant on writes.
//! - `Secret`: key material is missing or malformed. Fatal at startup.
//!
//! [`CryptoError`] and [`RenderError`] are per participant during generation:
//! the pipeline logs and counts them in its summary, so they never reach
//! [`Error`].

use crate::domain::ParticipantId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type returned by the command entry points.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required input was missing or invalid.
    #[error("Invalid input: {reason}")]
    Validation { reason: String },

    /// The roster could not be ingested.
    #[error("Roster ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    /// The participant store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Key material could not be resolved.
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    /// Filesystem failure outside of a single job (e.g. output directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Failures of [`crate::cipher::PiiCipher`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ciphertext is not valid hex, is too short, or the plaintext is not UTF-8.
    #[error("malformed ciphertext: {reason}")]
    Encoding { reason: &'static str },

    /// The authentication tag did not verify.
    #[error("ciphertext failed authentication")]
    Integrity,

    /// The cipher rejected the operation (e.g. plaintext too large).
    #[error("encryption failed")]
    Encrypt,
}

/// Failures of a [`crate::store::ParticipantStore`].
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The participant does not exist.
    #[error("participant {0} not found")]
    UnknownParticipant(ParticipantId),

    /// The participant already carries a fingerprint.
    #[error("participant {0} is already completed")]
    NotPending(ParticipantId),

    /// A stored value could not be decoded.
    #[error("corrupt row: {context}")]
    Corrupt { context: String },

    /// Backend-specific failure without a richer type (test doubles, etc).
    #[error("{0}")]
    Other(String),
}

/// Failures while reading a roster.
#[derive(thiserror::Error, Debug)]
pub enum IngestionError {
    /// The roster could not be opened or parsed as CSV.
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    /// A data row does not have exactly two columns.
    #[error("row {row}: expected 2 columns, found {found}")]
    ColumnCount { row: usize, found: usize },

    /// A required field is blank.
    #[error("row {row}: {column} is empty")]
    EmptyField { row: usize, column: &'static str },

    /// The identifier contains the QR token delimiter.
    #[error("row {row}: identifier must not contain ';'")]
    ReservedCharacter { row: usize },

    /// An identifier could not be encrypted.
    #[error("row {row}: {source}")]
    Encrypt { row: usize, source: CryptoError },
}

/// Failures while producing an artifact for one participant.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The QR token could not be encoded as an image.
    #[error("qr encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    /// The template is unusable (unreadable, missing placeholders, ...).
    #[error("template: {reason}")]
    Template { reason: String },

    /// Writing the artifact failed.
    #[error("artifact write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The renderer did not return within the configured deadline.
    #[error("renderer exceeded {0:?}")]
    Timeout(core::time::Duration),

    /// The renderer thread went away without producing a result.
    #[error("renderer thread exited without a result")]
    Disconnected,

    /// The renderer panicked.
    #[error("renderer panicked")]
    Panicked,
}

/// Failures when parsing or checking a scanned QR token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token does not follow `id;identifier;expiration;signature`.
    #[error("malformed token: {reason}")]
    Malformed { reason: &'static str },

    /// The signature does not match the payload.
    #[error("signature mismatch")]
    BadSignature,

    /// The token verified but its expiration has passed.
    #[error("token expired at {expires_at}")]
    Expired { expires_at: i64 },
}

/// Failures when resolving key material.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// The named secret is not configured.
    #[error("missing secret `{name}`")]
    Missing { name: &'static str },

    /// The secret is not 64 hex characters.
    #[error("secret `{name}` must be {expected} bytes of hex")]
    Malformed { name: &'static str, expected: usize },
}
