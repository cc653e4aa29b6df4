// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scorer and report aggregation.
//
// A page's score compares the classified label of every question against the
// answer key with exact string equality. The report builder collects page
// outcomes in whatever order workers finish and emits them ordered by page.

use chrono::Utc;
use omrgrade_core::types::{AnswerKey, Classification, Diagnostic, PageId, Report, RunId, ScoreRecord, SkippedPage};

use crate::pipeline::PageOutcome;

/// Score one page.
///
/// Questions `1..=key.len()` are compared; a question missing from the
/// classification counts as wrong. Classified questions beyond the key are
/// ignored.
pub fn score_page(
    page: PageId,
    image_name: &str,
    classification: Classification,
    key: &AnswerKey,
) -> ScoreRecord {
    let results: Vec<u8> = key
        .labels()
        .iter()
        .enumerate()
        .map(|(index, expected)| {
            let question = index as u32 + 1;
            u8::from(classification.get(question) == Some(expected.as_str()))
        })
        .collect();

    let total = results.len();
    let correct_count = results.iter().filter(|flag| **flag == 1).count();
    let marks = if total == 0 {
        0.0
    } else {
        correct_count as f64 / total as f64 * 100.0
    };

    ScoreRecord {
        page,
        image_name: image_name.to_string(),
        results,
        correct_count,
        total,
        correct_answers: format!("{correct_count} out of {total}"),
        marks,
        classification,
    }
}

/// Accumulates page outcomes into a [`Report`].
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: RunId,
    document: String,
    document_sha256: String,
    num_questions: usize,
    records: Vec<ScoreRecord>,
    skipped: Vec<SkippedPage>,
    diagnostics: Vec<Diagnostic>,
}

impl ReportBuilder {
    pub fn new(
        run_id: RunId,
        document: impl Into<String>,
        document_sha256: impl Into<String>,
        num_questions: usize,
    ) -> Self {
        Self {
            run_id,
            document: document.into(),
            document_sha256: document_sha256.into(),
            num_questions,
            records: Vec::new(),
            skipped: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Graded {
                record,
                diagnostics,
            } => {
                self.records.push(record);
                self.diagnostics.extend(diagnostics);
            }
            PageOutcome::Skipped {
                skipped,
                diagnostics,
            } => {
                self.skipped.push(skipped);
                self.diagnostics.extend(diagnostics);
            }
        }
    }

    /// Number of pages pushed so far.
    pub fn pages(&self) -> usize {
        self.records.len() + self.skipped.len()
    }

    /// Finish the report, ordering everything by page.
    pub fn build(mut self) -> Report {
        self.records.sort_by_key(|r| r.page);
        self.skipped.sort_by_key(|s| s.page);
        // Stable sort keeps per-page diagnostics in the order they were raised.
        self.diagnostics.sort_by_key(|d| d.page);

        Report {
            run_id: self.run_id,
            generated_at: Utc::now(),
            document: self.document,
            document_sha256: self.document_sha256,
            num_questions: self.num_questions,
            records: self.records,
            skipped: self.skipped,
            diagnostics: self.diagnostics,
        }
    }
}
