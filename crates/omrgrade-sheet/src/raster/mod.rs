// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module — turns PDFs, images and image folders into fixed-size pages.

pub mod rasterizer;

pub use rasterizer::{LoadedDocument, Page, Rasterizer};
