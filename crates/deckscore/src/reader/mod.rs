//! Plain-text extraction from uploaded decks.
//!
//! Each format has its own [`DocumentReader`]; [`ReaderRegistry`] resolves the
//! format of a stored file and dispatches to the matching reader.

pub mod pdf;
pub mod pptx;

use std::path::Path;

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::sanitize;

/// Separator placed between extracted text units (pages, slides).
pub const UNIT_SEPARATOR: &str = "\n";

pub trait DocumentReader: Send + Sync {
    /// Extracts text units in document order, joined by [`UNIT_SEPARATOR`].
    ///
    /// A document without extractable text yields an empty string.
    fn read(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ReaderRegistry {
    readers: Vec<Box<dyn DocumentReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self {
            readers: vec![
                Box::new(pdf::PdfReader::new()),
                Box::new(pptx::PptxReader::new()),
            ],
        }
    }

    /// Resolves the format of `path` from its extension, falling back to the
    /// declared content type when the extension is unknown.
    pub fn resolve_format(
        path: &Path,
        declared_type: Option<&str>,
    ) -> Result<DocumentFormat, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        DocumentFormat::from_extension(extension)
            .or_else(|| declared_type.and_then(DocumentFormat::from_content_type))
            .ok_or_else(|| {
                let shown = match (extension, declared_type) {
                    ("", Some(declared)) => declared.to_string(),
                    (ext, _) => ext.to_string(),
                };
                ProcessError::UnsupportedFormat(shown)
            })
    }

    pub fn can_read(&self, format: DocumentFormat) -> bool {
        self.readers.iter().any(|r| r.supports(format))
    }

    /// Reads the text of a stored document.
    ///
    /// Fails with `UnsupportedFormat` before touching the file, then with
    /// `NotFound` when the path does not exist.
    pub fn read(&self, path: &Path, declared_type: Option<&str>) -> Result<String, ProcessError> {
        let format = Self::resolve_format(path, declared_type)?;

        if !path.exists() {
            return Err(ProcessError::NotFound(path.to_path_buf()));
        }

        let _span = tracing::debug_span!(
            "reader.read",
            file = %sanitize::redact_path(path),
            format = %format,
        )
        .entered();

        match self.readers.iter().find(|r| r.supports(format)) {
            Some(reader) => reader.read(path),
            None => Err(ProcessError::UnsupportedFormat(match format {
                DocumentFormat::Ppt => "ppt (legacy binary PowerPoint)".to_string(),
                other => other.extension().to_string(),
            })),
        }
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends one text unit, separating it from what came before.
pub(crate) fn push_unit(out: &mut String, unit: &str) {
    let unit = unit.trim_end();
    if unit.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str(UNIT_SEPARATOR);
    }
    out.push_str(unit);
}
