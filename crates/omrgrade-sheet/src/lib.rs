// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// omrgrade-sheet — Answer-sheet image processing for the omrgrade grader.
//
// Provides page rasterization (PDF rendering, image decoding, fixed-size
// resampling), answer-region geometry (cropping, column and row
// segmentation), darkest-slot mark classification, and page-scoped
// inspection artifacts.

pub mod artifacts;
pub mod geometry;
pub mod marks;
pub mod raster;

// Re-export the primary items so callers can use `omrgrade_sheet::Rasterizer` etc.
pub use artifacts::{ArtifactSink, DirectoryArtifacts, DiscardArtifacts, MemoryArtifacts};
pub use geometry::crop::crop_answer_region;
pub use geometry::segment::{QuestionStrip, Segmentation, segment_region};
pub use marks::classify::{MarkDecision, classify_strip};
pub use raster::{LoadedDocument, Page, Rasterizer};
