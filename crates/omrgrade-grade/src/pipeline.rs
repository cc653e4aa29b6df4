// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page grading pipeline: crop, segment, classify, score.
//
// A page either yields a score record or is skipped; in both cases the
// recoverable problems met along the way come back as diagnostics. Nothing
// here is shared between pages except the read-only context.

use std::sync::Arc;

use image::DynamicImage;
use omrgrade_core::config::SheetLayout;
use omrgrade_core::types::{
    AnswerKey, Classification, Diagnostic, DiagnosticKind, PageId, ScoreRecord, SkippedPage,
};
use omrgrade_sheet::artifacts::ArtifactSink;
use omrgrade_sheet::marks::overlay::render_overlay;
use omrgrade_sheet::{Page, classify_strip, crop_answer_region, segment_region};
use tracing::{debug, info, instrument, warn};

use crate::scorer::score_page;

/// Read-only inputs shared by every page of a run.
#[derive(Clone)]
pub struct PageContext {
    pub layout: SheetLayout,
    pub key: AnswerKey,
    pub artifacts: Arc<dyn ArtifactSink>,
}

/// Result of grading one page.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Graded {
        record: ScoreRecord,
        diagnostics: Vec<Diagnostic>,
    },
    Skipped {
        skipped: SkippedPage,
        diagnostics: Vec<Diagnostic>,
    },
}

impl PageOutcome {
    pub fn page(&self) -> PageId {
        match self {
            Self::Graded { record, .. } => record.page,
            Self::Skipped { skipped, .. } => skipped.page,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Graded { diagnostics, .. } | Self::Skipped { diagnostics, .. } => diagnostics,
        }
    }
}

/// Grade one rasterized page.
///
/// Synchronous and CPU-bound; the runner calls it from blocking workers.
#[instrument(skip_all, fields(page = page.id.number(), name = %page.name))]
pub fn grade_page(page: Page, ctx: &PageContext) -> PageOutcome {
    let Page { id, name, image } = page;
    let sink = ctx.artifacts.as_ref();
    let mut diagnostics = Vec::new();

    store_artifact(sink, id, "page", &image, &mut diagnostics);

    let region = match crop_answer_region(&image, &ctx.layout.crop) {
        Ok(region) => region,
        Err(err) => {
            warn!(error = %err, "Page skipped: no answer region");
            diagnostics.push(Diagnostic::page(id, DiagnosticKind::EmptyRegion, err.to_string()));
            return PageOutcome::Skipped {
                skipped: SkippedPage {
                    page: id,
                    image_name: name,
                    reason: err.to_string(),
                },
                diagnostics,
            };
        }
    };
    drop(image);
    store_artifact(sink, id, "answer_region", &region, &mut diagnostics);

    let segmentation = segment_region(&region, &ctx.layout);
    if let Some(adjustment) = &segmentation.columns.adjustment {
        diagnostics.push(Diagnostic::page(
            id,
            DiagnosticKind::ColumnWidthAdjusted,
            adjustment.to_string(),
        ));
    }

    let mut classification = Classification::new();
    let mut decisions = Vec::with_capacity(segmentation.strips.len());
    for strip in &segmentation.strips {
        if !strip.bounds.is_empty() {
            store_artifact(sink, id, &strip.name(), &strip.image, &mut diagnostics);
        }
        match classify_strip(strip, &ctx.layout.option_labels) {
            Ok(decision) => {
                classification.insert(decision.question, decision.label.clone());
                decisions.push(decision);
            }
            Err(err) => {
                warn!(question = strip.question, error = %err, "Question left unclassified");
                diagnostics.push(Diagnostic::question(
                    id,
                    strip.question,
                    DiagnosticKind::StripLoad,
                    err.to_string(),
                ));
            }
        }
    }

    if sink.is_enabled() {
        let overlay = render_overlay(
            &region,
            &segmentation,
            &decisions,
            ctx.layout.option_labels.len(),
        );
        store_artifact(
            sink,
            id,
            "overlay",
            &DynamicImage::ImageRgb8(overlay),
            &mut diagnostics,
        );
    }

    let record = score_page(id, &name, classification, &ctx.key);
    info!(
        correct = record.correct_count,
        total = record.total,
        marks = record.marks,
        "Page graded"
    );
    PageOutcome::Graded {
        record,
        diagnostics,
    }
}

/// Store one artifact; a failed write becomes a diagnostic.
fn store_artifact(
    sink: &dyn ArtifactSink,
    page: PageId,
    name: &str,
    image: &DynamicImage,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !sink.is_enabled() {
        return;
    }
    match sink.store(page, name, image) {
        Ok(()) => debug!(artifact = name, "Artifact stored"),
        Err(err) => {
            warn!(artifact = name, error = %err, "Artifact not stored");
            diagnostics.push(Diagnostic::page(page, DiagnosticKind::ArtifactWrite, err.to_string()));
        }
    }
}
