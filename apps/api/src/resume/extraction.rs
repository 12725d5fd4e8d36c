//! Field extraction: turns recognized resume text into the five
//! profile fields.
//!
//! Every field falls back to the previous edit-buffer value when nothing is
//! found, so extraction never blanks out what the student already has.
//! Keyword heuristics live in one ordered table evaluated by a single
//! scanner; within a field the first table entry found in the text wins.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::profile::ProfileFields;
use crate::resume::file::ValidatedResume;
use crate::resume::ocr::{OcrEngine, OcrProgress, RecognitionError, RECOGNIZING_TEXT};
use crate::resume::progress::{MonotonicProgress, Phase, ProgressObserver};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

static CGPA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CGPA[:\s]*([0-9]\.[0-9]{1,2})").unwrap());

/// Fields filled by keyword scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordField {
    Branch,
    Skills,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordRule {
    /// The matched keyword itself, each word capitalised.
    Keyword,
    /// Text following the keyword up to `terminator` (or `max_chars`
    /// characters when the terminator never appears), with colons and line
    /// breaks removed.
    SectionAfter {
        terminator: &'static str,
        max_chars: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordEntry {
    pub keyword: &'static str,
    pub field: KeywordField,
    pub rule: KeywordRule,
}

const SKILLS_SECTION: KeywordRule = KeywordRule::SectionAfter {
    terminator: "experience",
    max_chars: 200,
};

/// Scanned in declaration order. Keywords are lowercase ASCII.
#[rustfmt::skip]
pub const KEYWORD_TABLE: &[KeywordEntry] = &[
    KeywordEntry { keyword: "computer science", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "information technology", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "electronics", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "mechanical", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "civil", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "electrical", field: KeywordField::Branch, rule: KeywordRule::Keyword },
    KeywordEntry { keyword: "skills", field: KeywordField::Skills, rule: SKILLS_SECTION },
    KeywordEntry { keyword: "technologies", field: KeywordField::Skills, rule: SKILLS_SECTION },
    KeywordEntry { keyword: "programming languages", field: KeywordField::Skills, rule: SKILLS_SECTION },
    KeywordEntry { keyword: "technical skills", field: KeywordField::Skills, rule: SKILLS_SECTION },
];

/// Sample values used for non-image uploads when the buffer has nothing.
pub const PLACEHOLDER_NAME: &str = "John Doe";
pub const PLACEHOLDER_EMAIL: &str = "john@example.com";
pub const PLACEHOLDER_CGPA: &str = "8.5";
pub const PLACEHOLDER_SKILLS: &str = "JavaScript, React, Node.js";
pub const PLACEHOLDER_BRANCH: &str = "Computer Science";

/// Derives profile fields from recognized text. Pure: the same text and
/// previous values always give the same result.
pub fn extract_fields(text: &str, previous: &ProfileFields) -> ProfileFields {
    ProfileFields {
        name: find_name(text).unwrap_or_else(|| previous.name.clone()),
        email: EMAIL_RE
            .find(text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| previous.email.clone()),
        cgpa: CGPA_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| previous.cgpa.clone()),
        skills: scan(text, KeywordField::Skills).unwrap_or_else(|| previous.skills.clone()),
        branch: scan(text, KeywordField::Branch).unwrap_or_else(|| previous.branch.clone()),
    }
}

/// Fields for uploads we cannot read: previous values where present,
/// otherwise fixed samples. Never returns an empty field.
pub fn placeholder_fields(previous: &ProfileFields) -> ProfileFields {
    fn keep_or(value: &str, placeholder: &str) -> String {
        if value.trim().is_empty() {
            placeholder.to_string()
        } else {
            value.to_string()
        }
    }

    ProfileFields {
        name: keep_or(&previous.name, PLACEHOLDER_NAME),
        email: keep_or(&previous.email, PLACEHOLDER_EMAIL),
        cgpa: keep_or(&previous.cgpa, PLACEHOLDER_CGPA),
        skills: keep_or(&previous.skills, PLACEHOLDER_SKILLS),
        branch: keep_or(&previous.branch, PLACEHOLDER_BRANCH),
    }
}

/// First non-blank line that is not an email line and does not look like a
/// "Resume"/"CV" heading.
fn find_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| {
            let lower = line.to_lowercase();
            !line.contains('@') && !lower.contains("resume") && !lower.contains("cv")
        })
        .map(String::from)
}

/// Evaluates `KEYWORD_TABLE` for one field. Stops at the first entry whose
/// keyword occurs anywhere in the text (case-insensitive).
pub fn scan(text: &str, field: KeywordField) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    KEYWORD_TABLE
        .iter()
        .filter(|entry| entry.field == field)
        .find_map(|entry| {
            let at = lower.find(entry.keyword)?;
            Some(apply_rule(entry, text, &lower, at))
        })
}

fn apply_rule(entry: &KeywordEntry, text: &str, lower: &str, at: usize) -> String {
    match entry.rule {
        KeywordRule::Keyword => capitalize_words(entry.keyword),
        KeywordRule::SectionAfter {
            terminator,
            max_chars,
        } => {
            let start = at + entry.keyword.len();
            let rest = &text[start..];
            let end = lower[start..]
                .find(terminator)
                .unwrap_or_else(|| byte_offset_of_char(rest, max_chars));
            rest[..end]
                .chars()
                .filter(|c| !matches!(c, ':' | '\n' | '\r'))
                .collect::<String>()
                .trim()
                .to_string()
        }
    }
}

fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

fn capitalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().to_string() + c.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs extraction for an uploaded file: OCR for images, placeholder
/// synthesis for everything else.
pub struct FieldExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl FieldExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub async fn extract(
        &self,
        file: &ValidatedResume,
        previous: &ProfileFields,
        observer: &dyn ProgressObserver,
    ) -> Result<ProfileFields, RecognitionError> {
        let progress = MonotonicProgress::new(observer, Phase::Extracting);
        progress.start();

        let fields = if file.kind.is_image() {
            let text = self.recognize(file, &progress).await?;
            debug!("recognized {} chars from {}", text.len(), file.filename);
            extract_fields(&text, previous)
        } else {
            for percent in (10..=100).step_by(10) {
                progress.report(percent);
            }
            placeholder_fields(previous)
        };

        progress.complete();
        Ok(fields)
    }

    /// OCR reads from a scratch copy of the upload; the copy is removed as
    /// soon as recognition returns, successful or not.
    async fn recognize(
        &self,
        file: &ValidatedResume,
        progress: &MonotonicProgress<'_>,
    ) -> Result<String, RecognitionError> {
        let scratch = tempfile::Builder::new()
            .prefix("resume-ocr-")
            .suffix(&format!(".{}", file.extension))
            .tempfile()?;
        tokio::fs::write(scratch.path(), &file.data).await?;

        let on_progress = |p: OcrProgress| {
            if p.status == RECOGNIZING_TEXT {
                progress.report_fraction(p.progress);
            }
        };
        let result = self.ocr.recognize(scratch.path(), &on_progress).await;
        drop(scratch);
        result
    }
}
