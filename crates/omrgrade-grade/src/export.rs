// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report export — the score table as CSV, the full report as JSON.

use std::io::Write;
use std::path::Path;

use omrgrade_core::error::{OmrError, Result};
use omrgrade_core::types::Report;
use tracing::{info, instrument};

/// Write the score table (`image_name, Q_1..Q_n, correct_answers, marks`).
/// Skipped pages produce no row.
pub fn write_csv<W: Write>(report: &Report, writer: W) -> Result<()> {
    let table = report.table();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.header)
        .map_err(|err| OmrError::Export(format!("CSV header: {err}")))?;
    for row in &table.rows {
        csv.write_record(row)
            .map_err(|err| OmrError::Export(format!("CSV row: {err}")))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the whole report, diagnostics included, as pretty JSON.
pub fn write_json<W: Write>(report: &Report, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_csv(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref()).map_err(|err| {
        OmrError::Export(format!("cannot create {}: {}", path.as_ref().display(), err))
    })?;
    write_csv(report, file)?;
    info!(rows = report.records.len(), "CSV report written");
    Ok(())
}

#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_json(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref()).map_err(|err| {
        OmrError::Export(format!("cannot create {}: {}", path.as_ref().display(), err))
    })?;
    write_json(report, std::io::BufWriter::new(file))?;
    info!("JSON report written");
    Ok(())
}
