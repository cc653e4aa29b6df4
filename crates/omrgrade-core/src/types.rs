// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the omrgrade answer-sheet grader.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OmrError, Result};

/// 1-based position of a page within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u32);

impl PageId {
    /// Build a page id from a 0-based index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page_{}", self.0)
    }
}

/// Unique identifier for one grading run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const PDF_HEADER: &[u8] = b"%PDF-";
const PDF_HEADER_WINDOW: usize = 1024;

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl DocumentType {
    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Infer document type from the leading magic bytes. A PDF header may
    /// also appear after up to 1 KiB of leading junk.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(PDF_HEADER) {
            Some(Self::Pdf)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Some(Self::Tiff)
        } else if data.starts_with(b"BM") {
            Some(Self::Bmp)
        } else if Self::pdf_header_offset(data).is_some() {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Byte offset of the `%PDF-` header within the first 1 KiB.
    pub fn pdf_header_offset(data: &[u8]) -> Option<usize> {
        let window = &data[..data.len().min(PDF_HEADER_WINDOW + PDF_HEADER.len())];
        window
            .windows(PDF_HEADER.len())
            .position(|w| w == PDF_HEADER)
    }

    /// Whether this is a single raster image (one page).
    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// Inclusive range of question numbers assigned to one column group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRange {
    pub start: u32,
    pub end: u32,
}

impl QuestionRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of questions in the range; zero when `end < start`.
    pub fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, question: u32) -> bool {
        (self.start..=self.end).contains(&question)
    }

    pub fn overlaps(&self, other: &QuestionRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The expected label for each question, 1-indexed.
///
/// Never empty: an answer key with no questions is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AnswerKey(Vec<String>);

impl AnswerKey {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(OmrError::ConfigMismatch(
                "answer key must contain at least one question".into(),
            ));
        }
        if let Some(pos) = labels.iter().position(|l| l.is_empty()) {
            return Err(OmrError::ConfigMismatch(format!(
                "answer key entry for question {} is empty",
                pos + 1
            )));
        }
        Ok(Self(labels))
    }

    /// Parse a comma-separated key such as `"A,B,C,D"`. Surrounding whitespace
    /// of each entry is ignored; label comparison itself stays case-sensitive.
    pub fn parse(input: &str) -> Result<Self> {
        Self::new(input.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expected label for a 1-based question number.
    pub fn label(&self, question: u32) -> Option<&str> {
        let index = (question as usize).checked_sub(1)?;
        self.0.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Ensure the key covers exactly `num_questions` questions.
    pub fn check_len(&self, num_questions: usize) -> Result<()> {
        if num_questions == 0 {
            return Err(OmrError::ConfigMismatch(
                "number of questions must be positive".into(),
            ));
        }
        if self.0.len() != num_questions {
            return Err(OmrError::ConfigMismatch(format!(
                "the number of answers ({}) does not match the number of questions ({})",
                self.0.len(),
                num_questions
            )));
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for AnswerKey {
    type Error = OmrError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<AnswerKey> for Vec<String> {
    fn from(key: AnswerKey) -> Self {
        key.0
    }
}

/// Chosen option label per question number for one page.
///
/// Questions whose strip could not be read are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(BTreeMap<u32, String>);

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question: u32, label: impl Into<String>) {
        self.0.insert(question, label.into());
    }

    pub fn get(&self, question: u32) -> Option<&str> {
        self.0.get(&question).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u32, String)> for Classification {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Score for one processed page. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub page: PageId,
    /// Page image identifier, e.g. `page_3.png` or the source file name.
    pub image_name: String,
    /// Per-question correctness flags (0/1), index 0 is question 1.
    pub results: Vec<u8>,
    pub correct_count: usize,
    pub total: usize,
    /// Human-readable `"k out of n"`.
    pub correct_answers: String,
    /// Percentage score in `[0, 100]`.
    pub marks: f64,
    /// Labels read from the sheet, for review.
    pub classification: Classification,
}

/// A page that produced no score row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPage {
    pub page: PageId,
    pub image_name: String,
    pub reason: String,
}

/// Category of a recoverable problem encountered while grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Crop offsets left no area; the page was skipped.
    EmptyRegion,
    /// Configured column widths did not sum to the region width.
    ColumnWidthAdjusted,
    /// A question strip was empty or too narrow to classify.
    StripLoad,
    /// An inspection artifact could not be written.
    ArtifactWrite,
}

/// Page- or question-scoped event recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub page: PageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<u32>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn page(page: PageId, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            page,
            question: None,
            kind,
            message: message.into(),
        }
    }

    pub fn question(
        page: PageId,
        question: u32,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            page,
            question: Some(question),
            kind,
            message: message.into(),
        }
    }
}

/// Terminal artifact of a grading run.
///
/// Records and skipped pages are ordered by page number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub document: String,
    pub document_sha256: String,
    pub num_questions: usize,
    pub records: Vec<ScoreRecord>,
    pub skipped: Vec<SkippedPage>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// True when every page of the document produced a score row.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn diagnostics_for(&self, page: PageId) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.page == page)
    }

    pub fn record(&self, page: PageId) -> Option<&ScoreRecord> {
        self.records.iter().find(|r| r.page == page)
    }

    /// Average percentage over scored pages, `None` if nothing was scored.
    pub fn mean_marks(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let sum: f64 = self.records.iter().map(|r| r.marks).sum();
        Some(sum / self.records.len() as f64)
    }

    /// Tabular view: `image_name`, `Q_1..Q_n`, `correct_answers`, `marks`.
    pub fn table(&self) -> ReportTable {
        let mut header = Vec::with_capacity(self.num_questions + 3);
        header.push("image_name".to_string());
        header.extend((1..=self.num_questions).map(|q| format!("Q_{q}")));
        header.push("correct_answers".to_string());
        header.push("marks".to_string());

        let rows = self
            .records
            .iter()
            .map(|record| {
                let mut row = Vec::with_capacity(header.len());
                row.push(record.image_name.clone());
                row.extend(record.results.iter().map(|flag| flag.to_string()));
                row.push(record.correct_answers.clone());
                row.push(format!("{:?}", record.marks));
                row
            })
            .collect();

        ReportTable { header, rows }
    }
}

/// Header plus one string row per scored page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
