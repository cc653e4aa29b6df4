// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for omrgrade.

use thiserror::Error;

/// Top-level error type for all grading operations.
#[derive(Debug, Error)]
pub enum OmrError {
    // -- Fatal: abort the whole run --
    #[error("cannot read document: {0}")]
    DocumentRead(String),

    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("invalid sheet layout: {0}")]
    InvalidLayout(String),

    #[error("grading run was cancelled")]
    Cancelled,

    #[error("grading run exceeded its deadline of {0} s")]
    DeadlineExceeded(u64),

    #[error("page worker failed: {0}")]
    Worker(String),

    // -- Per-page: the page is skipped --
    #[error("answer region is empty ({width}x{height} after applying offsets)")]
    EmptyRegion { width: i64, height: i64 },

    // -- Per-question: the question is scored as absent --
    #[error("cannot load strip for question {question}: {reason}")]
    StripLoad { question: u32, reason: String },

    // -- Artifacts / export --
    #[error("artifact write failed: {0}")]
    Artifact(String),

    #[error("report export failed: {0}")]
    Export(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OmrError {
    /// Whether this error aborts the whole run rather than a single page or
    /// question.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::EmptyRegion { .. } | Self::StripLoad { .. } | Self::Artifact(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OmrError>;
