// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable failure messages for whoever runs a grading job.
//
// Every error is mapped to a one-line cause and a concrete next step, so a
// failed run reports exactly one clear reason.

use crate::error::OmrError;

/// Whether the problem aborted the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The run produced no report.
    Run,
    /// One page was left out of the report.
    Page,
    /// One question was scored as unanswered.
    Question,
}

/// A plain-language explanation of an [`OmrError`].
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    pub scope: Scope,
}

/// Explain an error in terms of the answer sheets and the answer key.
pub fn explain(err: &OmrError) -> HumanError {
    match err {
        OmrError::DocumentRead(detail) => HumanError {
            message: "The answer-sheet document could not be read.".into(),
            suggestion: format!(
                "Check that the file is a PDF or an image (or a folder of images) and is not damaged. ({detail})"
            ),
            scope: Scope::Run,
        },

        OmrError::ConfigMismatch(detail) => HumanError {
            message: "The answer key does not fit the request.".into(),
            suggestion: format!(
                "Enter exactly one answer per question, separated by commas. ({detail})"
            ),
            scope: Scope::Run,
        },

        OmrError::InvalidLayout(detail) => HumanError {
            message: "The sheet layout configuration is invalid.".into(),
            suggestion: format!("Fix the layout file and try again. ({detail})"),
            scope: Scope::Run,
        },

        OmrError::Cancelled => HumanError {
            message: "Grading was cancelled.".into(),
            suggestion: "Run the job again to produce a report.".into(),
            scope: Scope::Run,
        },

        OmrError::DeadlineExceeded(secs) => HumanError {
            message: format!("Grading did not finish within {secs} seconds."),
            suggestion: "Allow a longer timeout or split the document into smaller batches."
                .into(),
            scope: Scope::Run,
        },

        OmrError::Worker(detail) => HumanError {
            message: "A page worker stopped unexpectedly.".into(),
            suggestion: format!("Run the job again; if it keeps failing, report the page. ({detail})"),
            scope: Scope::Run,
        },

        OmrError::EmptyRegion { .. } => HumanError {
            message: "A page was too small for the answer grid and was skipped.".into(),
            suggestion: "Check the crop offsets against the scanned page size.".into(),
            scope: Scope::Page,
        },

        OmrError::StripLoad { question, .. } => HumanError {
            message: format!("Question {question} could not be read and was marked wrong."),
            suggestion: "Check the column widths and row heights of the layout.".into(),
            scope: Scope::Question,
        },

        OmrError::Artifact(detail) => HumanError {
            message: "An inspection image could not be saved.".into(),
            suggestion: format!("Check that the artifacts folder is writable. ({detail})"),
            scope: Scope::Page,
        },

        OmrError::Export(detail) => HumanError {
            message: "The results could not be exported.".into(),
            suggestion: format!("Check the output path. ({detail})"),
            scope: Scope::Run,
        },

        OmrError::Io(io) => HumanError {
            message: "A file could not be read or written.".into(),
            suggestion: match io.kind() {
                std::io::ErrorKind::NotFound => "Check that the path exists.".into(),
                std::io::ErrorKind::PermissionDenied => {
                    "Check the file permissions.".into()
                }
                _ => format!("{io}"),
            },
            scope: Scope::Run,
        },

        OmrError::Serialization(detail) => HumanError {
            message: "A configuration or report file is malformed.".into(),
            suggestion: format!("Check the JSON syntax. ({detail})"),
            scope: Scope::Run,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_mismatch_is_run_scoped() {
        let human = explain(&OmrError::ConfigMismatch("3 vs 5".into()));
        assert_eq!(human.scope, Scope::Run);
        assert!(human.suggestion.contains("3 vs 5"));
    }

    #[test]
    fn strip_load_names_the_question() {
        let human = explain(&OmrError::StripLoad {
            question: 7,
            reason: "empty".into(),
        });
        assert_eq!(human.scope, Scope::Question);
        assert!(human.message.contains('7'));
    }

    #[test]
    fn scope_agrees_with_fatality() {
        let errors = [
            OmrError::DocumentRead("x".into()),
            OmrError::EmptyRegion { width: 0, height: 0 },
            OmrError::Cancelled,
            OmrError::Artifact("x".into()),
        ];
        for err in &errors {
            assert_eq!(explain(err).scope == Scope::Run, err.is_fatal(), "{err}");
        }
    }
}
