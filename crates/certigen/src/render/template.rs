use std::path::Path;

use super::{DocumentRenderer, RenderRequest};
use crate::error::RenderError;

/// Placeholder replaced by the inline QR `<svg>` element.
pub const QR_PLACEHOLDER: &str = "{{QRCODE}}";

/// Renders certificates by substituting placeholders in a UTF-8 template.
///
/// Supported placeholders are `{{FULL_NAME}}`, `{{IDENTIFIER}}`, `{{EVENT}}`,
/// `{{CERTIFICATE_ID}}`, `{{ISSUED_ON}}` and [`QR_PLACEHOLDER`]. Text values
/// are XML-escaped so the template may be SVG or HTML.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
    extension: String,
}

impl TemplateRenderer {
    /// Builds a renderer from template text.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Template`] if the template has nowhere to put
    /// the QR code.
    pub fn new(
        template: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let template = template.into();
        if !template.contains(QR_PLACEHOLDER) {
            return Err(RenderError::Template {
                reason: format!("missing {QR_PLACEHOLDER} placeholder"),
            });
        }
        Ok(Self {
            template,
            extension: extension.into(),
        })
    }

    /// Loads a template file. The artifact extension follows the file's.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|e| RenderError::Template {
            reason: format!("{}: {e}", path.display()),
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("txt");
        Self::new(template, extension)
    }
}

impl DocumentRenderer for TemplateRenderer {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let mut out = self.template.clone();
        for (placeholder, value) in request.fields.substitutions() {
            out = out.replace(placeholder, &escape_xml(value));
        }
        out = out.replace(QR_PLACEHOLDER, request.qr.svg_element());
        Ok(out.into_bytes())
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
