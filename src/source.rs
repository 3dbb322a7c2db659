//! Uploaded SVG documents and the file-read side of the host boundary.

use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Extension accepted at the upload boundary (compared case-insensitively).
pub const SVG_EXTENSION: &str = "svg";

/// Raw SVG text plus the display name it was uploaded under.
///
/// Immutable once created; the pipeline replaces it wholesale on the next
/// upload. The text is shared so in-flight renders can hold it without
/// copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    name: String,
    text: Arc<str>,
}

impl SourceDocument {
    /// Wrap already-decoded upload content.
    pub fn new(name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read an uploaded file from disk, refusing anything without a `.svg`
    /// extension. No other validation happens here.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !has_svg_extension(path) {
            return Err(Error::UnsupportedFile(format!(
                "{} (expected a .svg file)",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::UnsupportedFile(path.display().to_string()))?;
        let text = std::fs::read_to_string(path)?;
        log::debug!("read {} ({} bytes)", name, text.len());
        Ok(Self::new(name, text))
    }

    /// Display name, e.g. `logo.svg`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SVG markup
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

fn has_svg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SVG_EXTENSION))
}
