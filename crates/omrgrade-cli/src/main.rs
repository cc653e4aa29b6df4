// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// omrgrade — grade scanned multiple-choice answer sheets.
//
// Entry point. Initialises logging, parses the command line, runs the grading
// job with Ctrl-C wired to cancellation, and prints a per-page summary.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use omrgrade_core::human_errors::explain;
use omrgrade_core::{AnswerKey, GradingConfig, OmrError, Report, RunConfig};
use omrgrade_grade::{Grader, GradingRequest, save_csv, save_json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "omrgrade")]
#[command(about = "Grade scanned multiple-choice answer sheets against an answer key")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade every page of a PDF, an image, or a folder of images.
    Grade(GradeArgs),

    /// Print the default configuration (reference sheet layout) as JSON.
    Layout,
}

#[derive(Debug, Clone, Args)]
struct GradeArgs {
    /// Answer-sheet document: PDF, image file, or directory of images.
    #[arg(long)]
    document: PathBuf,

    /// Number of questions to score.
    #[arg(long)]
    questions: usize,

    /// Comma-separated answer key, e.g. "A,B,C,D".
    #[arg(long)]
    key: String,

    /// JSON configuration file (layout and run settings).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write page, region, strip and overlay images under this directory.
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Pages graded in parallel (default: available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Abort the run after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the full report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the score table as CSV.
    #[arg(long)]
    csv: Option<PathBuf>,
}

impl GradeArgs {
    /// Command-line flags take precedence over the configuration file.
    fn apply_to(&self, run: &mut RunConfig) {
        if let Some(dir) = &self.artifacts {
            run.artifacts_dir = Some(dir.clone());
        }
        if let Some(workers) = self.workers {
            run.workers = Some(workers);
        }
        if let Some(secs) = self.timeout_secs {
            run.deadline_secs = Some(secs);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Grade(args) => grade(args).await,
        Commands::Layout => print_layout(),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = explain(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            tracing::debug!(error = ?err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn grade(args: GradeArgs) -> Result<(), OmrError> {
    let mut config = match &args.config {
        Some(path) => GradingConfig::from_json_file(path)?,
        None => GradingConfig::default(),
    };
    args.apply_to(&mut config.run);

    let key = AnswerKey::parse(&args.key)?;
    let request = GradingRequest::new(&args.document, args.questions, key);
    let grader = Grader::new(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = grader.grade(&request, cancel).await?;
    print!("{}", summary(&report));

    if let Some(path) = &args.csv {
        save_csv(&report, path)?;
    }
    if let Some(path) = &args.json {
        save_json(&report, path)?;
    }
    info!(run_id = %report.run_id, "Done");
    Ok(())
}

fn print_layout() -> Result<(), OmrError> {
    println!("{}", GradingConfig::default().to_json_pretty()?);
    Ok(())
}

/// One line per page plus totals.
fn summary(report: &Report) -> String {
    let mut out = String::new();
    for record in &report.records {
        let _ = writeln!(
            out,
            "{:<24} {:>14}  {:>6.1}%",
            record.image_name, record.correct_answers, record.marks
        );
    }
    for skipped in &report.skipped {
        let _ = writeln!(out, "{:<24} skipped: {}", skipped.image_name, skipped.reason);
    }
    for diagnostic in &report.diagnostics {
        let question = diagnostic
            .question
            .map(|q| format!(" Q_{q}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {}{}: {:?}: {}",
            diagnostic.page, question, diagnostic.kind, diagnostic.message
        );
    }
    match report.mean_marks() {
        Some(mean) => {
            let _ = writeln!(
                out,
                "{} graded, {} skipped, mean {:.1}%",
                report.records.len(),
                report.skipped.len(),
                mean
            );
        }
        None => {
            let _ = writeln!(out, "no pages graded, {} skipped", report.skipped.len());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use omrgrade_core::{
        Classification, Diagnostic, DiagnosticKind, PageId, RunId, ScoreRecord, SkippedPage,
    };

    #[test]
    fn grade_flags_parse() {
        let cli = Cli::try_parse_from([
            "omrgrade",
            "grade",
            "--document",
            "sheets.pdf",
            "--questions",
            "5",
            "--key",
            "A,B,C,D,A",
            "--workers",
            "2",
            "--timeout-secs",
            "30",
        ])
        .unwrap();

        let Commands::Grade(args) = cli.command else {
            panic!("expected the grade subcommand");
        };
        assert_eq!(args.questions, 5);

        let mut run = RunConfig {
            workers: Some(8),
            ..RunConfig::default()
        };
        args.apply_to(&mut run);
        assert_eq!(run.workers, Some(2));
        assert_eq!(run.deadline_secs, Some(30));
        assert!(run.artifacts_dir.is_none());
    }

    #[test]
    fn grade_requires_a_key() {
        let parsed = Cli::try_parse_from([
            "omrgrade",
            "grade",
            "--document",
            "sheets.pdf",
            "--questions",
            "5",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn summary_lists_pages_and_diagnostics() {
        let report = Report {
            run_id: RunId::new(),
            generated_at: Utc::now(),
            document: "sheets.pdf".into(),
            document_sha256: String::new(),
            num_questions: 5,
            records: vec![ScoreRecord {
                page: PageId(1),
                image_name: "page_1.png".into(),
                results: vec![1, 1, 0, 1, 1],
                correct_count: 4,
                total: 5,
                correct_answers: "4 out of 5".into(),
                marks: 80.0,
                classification: Classification::new(),
            }],
            skipped: vec![SkippedPage {
                page: PageId(2),
                image_name: "page_2.png".into(),
                reason: "answer region is empty".into(),
            }],
            diagnostics: vec![Diagnostic::page(
                PageId(2),
                DiagnosticKind::EmptyRegion,
                "answer region is empty",
            )],
        };

        let text = summary(&report);
        assert!(text.contains("4 out of 5"), "{text}");
        assert!(text.contains("80.0%"), "{text}");
        assert!(text.contains("page_2.png"), "{text}");
        assert!(text.contains("EmptyRegion"), "{text}");
        assert!(text.ends_with("1 graded, 1 skipped, mean 80.0%\n"), "{text}");
    }
}
