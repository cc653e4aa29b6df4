// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// omrgrade-grade — Scoring and orchestration for the omrgrade grader.
//
// Scores classified pages against the answer key, runs pages through the
// sheet pipeline on a bounded worker pool, assembles the ordered report and
// exports it as CSV or JSON.

pub mod export;
pub mod pipeline;
pub mod runner;
pub mod scorer;

#[cfg(test)]
pub(crate) mod testing;

pub use export::{save_csv, save_json, write_csv, write_json};
pub use pipeline::{PageContext, PageOutcome, grade_page};
pub use runner::{Grader, GradingRequest};
pub use scorer::{ReportBuilder, score_page};
