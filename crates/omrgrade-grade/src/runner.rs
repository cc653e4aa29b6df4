// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grading runner — validates a request, rasterizes the document off the async
// runtime, then fans pages out to a bounded pool of blocking workers.
//
// Pages are independent. At most `workers` pages are processed at once, each
// on its own blocking thread, and the report is assembled in page order no
// matter which worker finishes first. A run can be cancelled through a
// `CancellationToken` or bounded by a wall-clock deadline; either aborts all
// outstanding pages and fails the whole run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use omrgrade_core::config::{GradingConfig, SheetLayout};
use omrgrade_core::error::{OmrError, Result};
use omrgrade_core::types::{AnswerKey, Report, RunId};
use omrgrade_sheet::artifacts::{ArtifactSink, DirectoryArtifacts, DiscardArtifacts};
use omrgrade_sheet::{Page, Rasterizer};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::pipeline::{PageContext, grade_page};
use crate::scorer::ReportBuilder;

/// What to grade and against which key.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub document: PathBuf,
    pub num_questions: usize,
    pub answer_key: AnswerKey,
}

impl GradingRequest {
    pub fn new(document: impl Into<PathBuf>, num_questions: usize, answer_key: AnswerKey) -> Self {
        Self {
            document: document.into(),
            num_questions,
            answer_key,
        }
    }

    /// Check the request against the layout before any image is touched.
    pub fn validate(&self, layout: &SheetLayout) -> Result<()> {
        self.answer_key.check_len(self.num_questions)?;
        if !layout.covers(self.num_questions) {
            return Err(OmrError::ConfigMismatch(format!(
                "{} questions requested but the sheet layout only prints {}",
                self.num_questions,
                layout.question_capacity()
            )));
        }
        Ok(())
    }
}

/// Wall-clock limit of a run.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    secs: u64,
}

/// Grades documents printed with one sheet layout.
///
/// ```ignore
/// let grader = Grader::new(GradingConfig::default())?;
/// let request = GradingRequest::new("sheets.pdf", 20, AnswerKey::parse("A,B,C,...")?);
/// let report = grader.grade(&request, CancellationToken::new()).await?;
/// ```
#[derive(Clone)]
pub struct Grader {
    config: GradingConfig,
    artifacts: Option<Arc<dyn ArtifactSink>>,
}

impl Grader {
    /// Build a grader, rejecting layouts that cannot be segmented.
    pub fn new(config: GradingConfig) -> Result<Self> {
        config.layout.validate()?;
        Ok(Self {
            config,
            artifacts: None,
        })
    }

    /// Send artifacts to `sink` instead of `run.artifacts_dir`.
    pub fn with_artifacts(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    // -- Runs -----------------------------------------------------------------

    /// Grade every page of `request.document`.
    #[instrument(skip_all, fields(document = %request.document.display(), questions = request.num_questions))]
    pub async fn grade(&self, request: &GradingRequest, cancel: CancellationToken) -> Result<Report> {
        request.validate(&self.config.layout)?;
        let run_id = RunId::new();
        let deadline = self.deadline();
        info!(%run_id, "Grading run started");

        let rasterizer = Rasterizer::new(self.config.layout.raster);
        let path = request.document.clone();
        let loading = async move {
            tokio::task::spawn_blocking(move || rasterizer.load(&path))
                .await
                .map_err(|err| OmrError::Worker(format!("rasterizer task failed: {err}")))?
        };
        let document = guarded(loading, &cancel, deadline).await?;

        self.run_pages(run_id, request, document.pages, document.sha256, cancel, deadline)
            .await
    }

    /// Grade pages that were rasterized elsewhere. The report digest covers
    /// the page pixels.
    #[instrument(skip_all, fields(pages = pages.len(), questions = request.num_questions))]
    pub async fn grade_pages(
        &self,
        request: &GradingRequest,
        pages: Vec<Page>,
        cancel: CancellationToken,
    ) -> Result<Report> {
        request.validate(&self.config.layout)?;
        let mut hasher = Sha256::new();
        for page in &pages {
            hasher.update(page.image.as_bytes());
        }
        let sha256 = hex::encode(hasher.finalize());

        self.run_pages(RunId::new(), request, pages, sha256, cancel, self.deadline())
            .await
    }

    async fn run_pages(
        &self,
        run_id: RunId,
        request: &GradingRequest,
        pages: Vec<Page>,
        sha256: String,
        cancel: CancellationToken,
        deadline: Option<Deadline>,
    ) -> Result<Report> {
        let workers = self.config.run.worker_count();
        let page_count = pages.len();
        info!(%run_id, pages = page_count, workers, "Grading pages");

        let ctx = Arc::new(PageContext {
            layout: self.config.layout.clone(),
            key: request.answer_key.clone(),
            artifacts: self.artifact_sink(run_id),
        });
        let semaphore = Arc::new(Semaphore::new(workers));
        let page_cancel = cancel.child_token();

        let mut tasks = JoinSet::new();
        for page in pages {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let token = page_cancel.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| OmrError::Cancelled)?;
                if token.is_cancelled() {
                    return Err(OmrError::Cancelled);
                }
                tokio::task::spawn_blocking(move || grade_page(page, &ctx))
                    .await
                    .map_err(|err| OmrError::Worker(format!("page worker failed: {err}")))
            });
        }

        let mut builder = ReportBuilder::new(
            run_id,
            request.document.display().to_string(),
            sha256,
            request.num_questions,
        );
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                let outcome = joined
                    .map_err(|err| OmrError::Worker(format!("page task failed: {err}")))??;
                builder.push(outcome);
            }
            Ok::<(), OmrError>(())
        };
        let collected = guarded(collect, &cancel, deadline).await;

        if let Err(err) = collected {
            page_cancel.cancel();
            tasks.abort_all();
            warn!(%run_id, error = %err, "Grading run aborted");
            return Err(err);
        }

        let report = builder.build();
        info!(
            %run_id,
            graded = report.records.len(),
            skipped = report.skipped.len(),
            diagnostics = report.diagnostics.len(),
            "Grading run finished"
        );
        Ok(report)
    }

    // -- Helpers --------------------------------------------------------------

    fn deadline(&self) -> Option<Deadline> {
        let secs = self.config.run.deadline_secs?;
        let duration = self.config.run.deadline()?;
        Some(Deadline {
            at: Instant::now() + duration,
            secs,
        })
    }

    /// Explicit sink, else `<artifacts_dir>/<run_id>`, else nothing.
    fn artifact_sink(&self, run_id: RunId) -> Arc<dyn ArtifactSink> {
        if let Some(sink) = &self.artifacts {
            return Arc::clone(sink);
        }
        let Some(dir) = &self.config.run.artifacts_dir else {
            return Arc::new(DiscardArtifacts);
        };
        match DirectoryArtifacts::new(dir.join(run_id.to_string())) {
            Ok(sink) => {
                info!(root = %sink.root().display(), "Writing artifacts");
                Arc::new(sink)
            }
            Err(err) => {
                warn!(error = %err, "Artifacts disabled for this run");
                Arc::new(DiscardArtifacts)
            }
        }
    }
}

/// Drive `work` until it completes, the token is cancelled, or the deadline
/// passes, whichever comes first. Cancellation is checked first.
async fn guarded<T>(
    work: impl Future<Output = Result<T>>,
    cancel: &CancellationToken,
    deadline: Option<Deadline>,
) -> Result<T> {
    let expired = async {
        match deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline.at).await;
                deadline.secs
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OmrError::Cancelled),
        secs = expired => Err(OmrError::DeadlineExceeded(secs)),
        result = work => result,
    }
}
