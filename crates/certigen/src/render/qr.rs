use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::error::RenderError;

/// Minimum edge length, in pixels, of the rendered code.
pub const QR_MIN_SIZE: u32 = 256;

/// A QR code carrying a signed token, rendered as a standalone SVG document.
#[derive(Clone, PartialEq, Eq)]
pub struct QrImage {
    svg: String,
}

impl QrImage {
    /// Encodes `data` with medium error correction.
    pub fn encode(data: &str) -> Result<Self, RenderError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
        let svg = code
            .render::<svg::Color<'_>>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build();
        Ok(Self { svg })
    }

    /// The full SVG document, including its XML declaration.
    pub fn svg(&self) -> &str {
        &self.svg
    }

    /// The `<svg ...>...</svg>` element alone, for inlining in another
    /// document.
    pub fn svg_element(&self) -> &str {
        self.svg
            .find("<svg")
            .map_or(self.svg.as_str(), |start| &self.svg[start..])
    }
}

// The encoded token includes the plaintext identifier.
impl core::fmt::Debug for QrImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QrImage")
            .field("svg_bytes", &self.svg.len())
            .finish()
    }
}
