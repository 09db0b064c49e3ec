use crate::error::Result;
use std::path::Path;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// An uploaded file: its name (the document identifier), declared media type
/// and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), media_type: media_type.into(), bytes }
    }

    pub fn text(name: impl Into<String>, content: &str) -> Self {
        Self::new(name, MIME_TEXT, content.as_bytes().to_vec())
    }

    /// Read a file from disk, naming it by its file name and guessing the
    /// media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::new(name, guess_media_type(path), bytes))
    }
}

pub fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "log" => MIME_TEXT,
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "xlsx" => MIME_XLSX,
        "pptx" => MIME_PPTX,
        _ => "application/octet-stream",
    }
}

/// Turns an uploaded file into plain text. `None` means the file cannot be
/// indexed.
pub trait TextExtractor: Send + Sync {
    fn read_file(&self, file: &SourceFile) -> Option<String>;
}

impl<F> TextExtractor for F
where
    F: Fn(&SourceFile) -> Option<String> + Send + Sync,
{
    fn read_file(&self, file: &SourceFile) -> Option<String> {
        self(file)
    }
}

/// Decodes anything that is not a known office/PDF type as UTF-8. Rich
/// formats are left to external extractors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn read_file(&self, file: &SourceFile) -> Option<String> {
        match file.media_type.as_str() {
            MIME_PDF | MIME_DOCX | MIME_XLSX | MIME_PPTX => {
                tracing::debug!(file = %file.name, media_type = %file.media_type, "no built-in extractor for media type");
                None
            }
            _ => match std::str::from_utf8(&file.bytes) {
                Ok(text) => Some(text.to_string()),
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "file is not valid UTF-8");
                    None
                }
            },
        }
    }
}
