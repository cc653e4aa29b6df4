// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic answer sheets for tests.

use image::{DynamicImage, GrayImage, Luma};
use omrgrade_core::config::SheetLayout;
use omrgrade_core::types::AnswerKey;
use omrgrade_sheet::geometry::crop::answer_rect;
use omrgrade_sheet::geometry::segment::{split_columns, split_rows};
use omrgrade_sheet::marks::classify::slot_ranges;

const PAPER: u8 = 245;
const INK: u8 = 20;

/// A full-size page on which question `q` has slot `s` filled for every
/// `(q, s)` in `marks`. Unmarked questions are blank paper.
pub(crate) fn sheet_with_marks(layout: &SheetLayout, marks: &[(u32, usize)]) -> DynamicImage {
    let (width, height) = (layout.raster.width, layout.raster.height);
    let mut page = GrayImage::from_pixel(width, height, Luma([PAPER]));

    if let Ok(region) = answer_rect(width, height, &layout.crop) {
        let columns = split_columns(region.width, &layout.columns);
        for span in &columns.spans {
            let Some(range) = span.questions else {
                continue;
            };
            let slots = slot_ranges(span.width, layout.option_labels.len());
            for bounds in split_rows(region.height, range, &layout.rows) {
                let Some(&(_, slot)) = marks.iter().find(|(q, _)| *q == bounds.question) else {
                    continue;
                };
                let (start, end) = slots[slot];
                for y in bounds.y..bounds.y + bounds.height {
                    for x in start..end {
                        page.put_pixel(region.x + span.x + x, region.y + y, Luma([INK]));
                    }
                }
            }
        }
    }

    DynamicImage::ImageLuma8(page)
}

/// `A, B, C, D` repeated over 20 questions.
pub(crate) fn reference_key() -> AnswerKey {
    cycling_key(20)
}

pub(crate) fn cycling_key(len: usize) -> AnswerKey {
    let labels = ["A", "B", "C", "D"];
    AnswerKey::new((0..len).map(|i| labels[i % 4].to_string()).collect())
        .expect("non-empty key")
}

/// Marks that answer every question of `key` correctly on the default layout.
pub(crate) fn correct_marks(key: &AnswerKey, layout: &SheetLayout) -> Vec<(u32, usize)> {
    key.labels()
        .iter()
        .enumerate()
        .filter_map(|(i, label)| {
            layout
                .option_labels
                .iter()
                .position(|l| l == label)
                .map(|slot| (i as u32 + 1, slot))
        })
        .collect()
}
