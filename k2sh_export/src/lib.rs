//! Exporters that turn a K2SHBWI container into a viewable document.
//!
//! Every export runs the same pipeline: decode the container (which
//! re-verifies its checksum), render the decoded image and metadata
//! into the target format, and write the result atomically. HTML is
//! always available; PDF and PPTX are behind the `pdf` and `pptx`
//! cargo features so embedders can drop the heavier renderers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use k2sh_core::io::write_atomic;
use k2sh_core::Decoded;

mod html;
#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "pptx")]
mod pptx;

/// Heading used when a container carries no title field.
pub(crate) const FALLBACK_TITLE: &str = "K2SHBWI image";

// ───────────────────────────── formats ─────────────────────────────

/// A document format a container can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Pdf,
    Pptx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Html, ExportFormat::Pdf, ExportFormat::Pptx];

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
        }
    }

    /// File extension for the rendered document, without the dot.
    pub fn extension(self) -> &'static str {
        self.name()
    }

    /// Whether the renderer for this format was compiled in.
    pub fn available(self) -> bool {
        match self {
            ExportFormat::Html => true,
            ExportFormat::Pdf => cfg!(feature = "pdf"),
            ExportFormat::Pptx => cfg!(feature = "pptx"),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" | "htm" | "web" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            "pptx" | "ppt" | "slides" => Ok(ExportFormat::Pptx),
            other => Err(format!(
                "unknown export format '{other}' (expected html, pdf, or pptx)"
            )),
        }
    }
}

// ───────────────────────────── errors ──────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The requested renderer was compiled out of this build.
    #[error("{format} export requires the '{feature}' cargo feature, which this build lacks")]
    DependencyMissing {
        format: ExportFormat,
        feature: &'static str,
    },

    /// The container itself failed to decode.
    #[error(transparent)]
    Container(#[from] k2sh_core::Error),

    /// The renderer could not produce a document from a valid container.
    #[error("{format} rendering failed: {reason}")]
    Render { format: ExportFormat, reason: String },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

// ───────────────────────────── convert ─────────────────────────────

/// What a successful export produced.
#[derive(Debug)]
pub struct ExportReport {
    pub format: ExportFormat,
    pub output: PathBuf,
    pub bytes_written: u64,
}

/// Renders `container` into `format` and writes the document to `output`.
///
/// The container is fully decoded first, so a corrupt file fails here
/// with a [`k2sh_core::Error`] before anything touches the disk. The
/// output file either appears complete or not at all.
pub fn convert(
    container: &[u8],
    format: ExportFormat,
    output: &Path,
) -> Result<ExportReport, ExportError> {
    debug!(format = %format, "decoding container");
    let decoded = k2sh_core::decode(container)?;

    debug!(format = %format, "rendering document");
    let bytes = match format {
        ExportFormat::Html => html::render(&decoded),
        ExportFormat::Pdf => render_pdf(&decoded)?,
        ExportFormat::Pptx => render_pptx(&decoded)?,
    };
    if bytes.is_empty() {
        return Err(ExportError::Render {
            format,
            reason: "renderer produced no bytes".into(),
        });
    }

    write_atomic(output, &bytes)?;
    info!(format = %format, output = %output.display(), bytes = bytes.len(), "export written");
    Ok(ExportReport {
        format,
        output: output.to_path_buf(),
        bytes_written: bytes.len() as u64,
    })
}

#[cfg(feature = "pdf")]
fn render_pdf(decoded: &Decoded) -> Result<Vec<u8>, ExportError> {
    pdf::render(decoded)
}

#[cfg(not(feature = "pdf"))]
fn render_pdf(_decoded: &Decoded) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::DependencyMissing {
        format: ExportFormat::Pdf,
        feature: "pdf",
    })
}

#[cfg(feature = "pptx")]
fn render_pptx(decoded: &Decoded) -> Result<Vec<u8>, ExportError> {
    pptx::render(decoded)
}

#[cfg(not(feature = "pptx"))]
fn render_pptx(_decoded: &Decoded) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::DependencyMissing {
        format: ExportFormat::Pptx,
        feature: "pptx",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_back() {
        for format in ExportFormat::ALL {
            assert_eq!(format.name().parse::<ExportFormat>(), Ok(format));
        }
    }

    #[test]
    fn format_aliases_are_accepted() {
        assert_eq!("WEB".parse::<ExportFormat>(), Ok(ExportFormat::Html));
        assert_eq!("slides".parse::<ExportFormat>(), Ok(ExportFormat::Pptx));
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn html_is_always_available() {
        assert!(ExportFormat::Html.available());
    }
}
