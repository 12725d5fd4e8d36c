//! Upload validation: which files the pipeline accepts and how each kind is
//! routed (images go through OCR, everything else gets placeholder fields).

use bytes::Bytes;

/// Extensions offered by the upload picker.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "png", "jpg", "jpeg"];

const PDF_MIME: &str = "application/pdf";
const MSWORD_MIME: &str = "application/msword";
const GENERIC_MIME: &str = "application/octet-stream";

pub const INVALID_TYPE_MESSAGE: &str = "Please upload a valid PDF, image, or document file.";
pub const MISSING_FILE_MESSAGE: &str = "Please select a file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    Pdf,
    Image,
    Document,
}

impl ResumeKind {
    /// Classifies a MIME type against the allow-list: `application/pdf`,
    /// any `image/*`, and document types (`application/msword` or anything
    /// naming a "document", e.g. the OOXML word-processing type).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == PDF_MIME {
            Some(ResumeKind::Pdf)
        } else if essence.starts_with("image/") {
            Some(ResumeKind::Image)
        } else if essence == MSWORD_MIME || essence.contains("document") {
            Some(ResumeKind::Document)
        } else {
            None
        }
    }

    pub fn is_image(self) -> bool {
        self == ResumeKind::Image
    }
}

/// A file selected by the student, as received by the API.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A file that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedResume {
    pub filename: String,
    pub mime: String,
    pub kind: ResumeKind,
    pub extension: String,
    pub data: Bytes,
}

impl ResumeFile {
    /// Validates the declared MIME type. When the client sent none (or the
    /// generic octet-stream), the type is guessed from an allow-listed
    /// extension instead. Returns the user-facing rejection message on failure.
    pub fn validate(self) -> Result<ValidatedResume, &'static str> {
        if self.data.is_empty() {
            return Err(MISSING_FILE_MESSAGE);
        }

        let extension = file_extension(&self.filename);
        let declared = self
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case(GENERIC_MIME));

        let mime = match declared {
            Some(m) => m.to_string(),
            None => {
                let ext = extension
                    .as_deref()
                    .filter(|e| ALLOWED_EXTENSIONS.contains(e))
                    .ok_or(INVALID_TYPE_MESSAGE)?;
                mime_guess::from_ext(ext)
                    .first_raw()
                    .ok_or(INVALID_TYPE_MESSAGE)?
                    .to_string()
            }
        };

        let kind = ResumeKind::from_mime(&mime).ok_or(INVALID_TYPE_MESSAGE)?;
        // The extension ends up in storage keys and scratch file names.
        let extension = extension
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or_else(|| default_extension(kind, &mime).to_string());

        Ok(ValidatedResume {
            filename: self.filename,
            mime,
            kind,
            extension,
            data: self.data,
        })
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn default_extension(kind: ResumeKind, mime: &str) -> &'static str {
    match kind {
        ResumeKind::Pdf => "pdf",
        ResumeKind::Document if mime.contains("openxmlformats") => "docx",
        ResumeKind::Document => "doc",
        ResumeKind::Image => mime_guess::get_mime_extensions_str(mime)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("img"),
    }
}
