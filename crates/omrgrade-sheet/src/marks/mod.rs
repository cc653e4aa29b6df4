// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Marks module — darkest-slot classification and calibration overlays.

pub mod classify;
pub mod overlay;
