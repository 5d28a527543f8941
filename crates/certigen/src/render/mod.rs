//! Document rendering contract.
//!
//! The pipeline treats rendering as a black box: it hands over the text
//! substitutions and the QR image and gets the final artifact bytes back.
//!
//! ## Structure
//!
//! - [`qr`] - QR image encoding of the signed token.
//! - [`template`] - placeholder substitution into a text template (SVG,
//!   HTML, ...).

pub mod qr;
pub mod template;

pub use qr::QrImage;
pub use template::TemplateRenderer;

use crate::domain::ParticipantId;
use crate::error::RenderError;

/// Text substitutions for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    pub full_name: String,
    /// Identifier with its verification digits hidden, see [`mask_identifier`].
    pub masked_identifier: String,
    pub event_name: String,
    pub certificate_id: String,
    /// Human-readable issue date.
    pub issued_on: String,
}

impl CertificateFields {
    /// Placeholder/value pairs in template order.
    pub fn substitutions(&self) -> [(&'static str, &str); 5] {
        [
            ("{{FULL_NAME}}", self.full_name.as_str()),
            ("{{IDENTIFIER}}", self.masked_identifier.as_str()),
            ("{{EVENT}}", self.event_name.as_str()),
            ("{{CERTIFICATE_ID}}", self.certificate_id.as_str()),
            ("{{ISSUED_ON}}", self.issued_on.as_str()),
        ]
    }
}

/// Everything a renderer needs for one participant.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub fields: CertificateFields,
    pub qr: QrImage,
}

/// Turns fields and a QR image into final document bytes.
///
/// Implementations are called concurrently from every worker and may block.
pub trait DocumentRenderer: Send + Sync {
    /// File extension (without the dot) of the produced artifacts.
    fn extension(&self) -> &str;

    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;
}

/// Hides the two check digits of an 11-digit identifier:
/// `12345678901` becomes `123.456.789-**`. Anything else is returned as is.
pub fn mask_identifier(identifier: &str) -> String {
    if identifier.len() == 11 && identifier.bytes().all(|b| b.is_ascii_digit()) {
        format!(
            "{}.{}.{}-**",
            &identifier[0..3],
            &identifier[3..6],
            &identifier[6..9]
        )
    } else {
        identifier.to_owned()
    }
}

/// Output file name for a participant's artifact.
///
/// Embeds the plaintext identifier, matching the naming of previously issued
/// certificates, followed by the participant id so that identifiers which
/// sanitize to the same text never share a file.
pub fn artifact_file_name(
    identifier: &str,
    participant_id: ParticipantId,
    extension: &str,
) -> String {
    let safe: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("certificate_{safe}_{participant_id}.{extension}")
}
