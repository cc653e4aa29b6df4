// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout segmenter — split the answer region into column groups, then each
// column group into one strip per question.
//
// Boundaries are pure functions of the layout and the region size, computed
// separately from the pixel crops so they can be inspected and tested
// without images.

use image::DynamicImage;
use omrgrade_core::config::{ColumnConfig, RemainderPolicy, RowConfig, SheetLayout};
use omrgrade_core::types::{QuestionRange, Rect};
use tracing::{debug, instrument, warn};

/// Horizontal extent of one column group inside the answer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    /// 0-based position in the layout's column list.
    pub index: usize,
    pub x: u32,
    pub width: u32,
    pub questions: Option<QuestionRange>,
}

/// Recorded when configured column widths do not add up to the region width.
/// The last column absorbs the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthAdjustment {
    pub configured_total: u64,
    pub region_width: u32,
    pub configured_last: u32,
    pub actual_last: u32,
}

impl std::fmt::Display for WidthAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "column widths sum to {} but the region is {} px wide; last column adjusted from {} to {} px",
            self.configured_total, self.region_width, self.configured_last, self.actual_last
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSplit {
    pub spans: Vec<ColumnSpan>,
    pub adjustment: Option<WidthAdjustment>,
}

/// Vertical extent of one question strip inside its column group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripBounds {
    pub question: u32,
    pub y: u32,
    pub height: u32,
}

/// The image slice for exactly one question, identified as `Q_<question>`.
#[derive(Debug, Clone)]
pub struct QuestionStrip {
    pub question: u32,
    /// Position inside the answer region.
    pub bounds: Rect,
    pub image: DynamicImage,
}

impl QuestionStrip {
    pub fn name(&self) -> String {
        format!("Q_{}", self.question)
    }
}

/// Column split plus every question strip, ordered by question number.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub columns: ColumnSplit,
    pub strips: Vec<QuestionStrip>,
}

/// Divide `region_width` into columns left to right.
///
/// Every column but the last takes its configured width, clamped to what is
/// left; the last column takes exactly the remainder. Widths never go
/// negative.
pub fn split_columns(region_width: u32, columns: &[ColumnConfig]) -> ColumnSplit {
    let configured_total: u64 = columns.iter().map(|c| u64::from(c.width)).sum();
    let last = columns.len().saturating_sub(1);

    let mut x = 0u32;
    let spans: Vec<ColumnSpan> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let remaining = region_width - x;
            let width = if index == last {
                remaining
            } else {
                column.width.min(remaining)
            };
            let span = ColumnSpan {
                index,
                x,
                width,
                questions: column.questions,
            };
            x += width;
            span
        })
        .collect();

    let adjustment = (configured_total != u64::from(region_width)).then(|| WidthAdjustment {
        configured_total,
        region_width,
        configured_last: columns.last().map(|c| c.width).unwrap_or(0),
        actual_last: spans.last().map(|s| s.width).unwrap_or(0),
    });
    if let Some(adjustment) = &adjustment {
        warn!(%adjustment, "Column widths do not match the answer region");
    }

    ColumnSplit { spans, adjustment }
}

/// Split a column of `group_height` rows into one strip per question.
///
/// The first `fixed_questions` strips are `height_per_question` tall; the
/// rest share the leftover height by floor division. Each strip's bottom is
/// clamped to the group height, so a strip can come out shorter than its
/// step or empty. Under [`RemainderPolicy::StretchLast`] the final strip
/// instead ends exactly at the bottom of the group.
pub fn split_rows(group_height: u32, range: QuestionRange, rows: &RowConfig) -> Vec<StripBounds> {
    let count = i64::from(range.len());
    let fixed = i64::from(rows.fixed_questions);
    let fixed_step = i64::from(rows.height_per_question);
    let height = i64::from(group_height);

    let remaining_questions = count - fixed;
    let remaining_step = if remaining_questions > 0 {
        (height - fixed * fixed_step).div_euclid(remaining_questions)
    } else {
        fixed_step
    };

    let mut cursor = 0i64;
    (0..count)
        .map(|index| {
            let step = if index < fixed { fixed_step } else { remaining_step };
            let top = cursor;
            let mut bottom = top + step;
            cursor = bottom;

            if bottom > height {
                bottom = height;
            }
            if rows.remainder == RemainderPolicy::StretchLast && index == count - 1 {
                bottom = height;
            }

            let top = top.clamp(0, height);
            let bottom = bottom.clamp(0, height);
            StripBounds {
                question: range.start + index as u32,
                y: top as u32,
                height: (bottom - top).max(0) as u32,
            }
        })
        .collect()
}

/// Cut the answer region into one strip per question.
#[instrument(skip_all, fields(region_w = region.width(), region_h = region.height()))]
pub fn segment_region(region: &DynamicImage, layout: &SheetLayout) -> Segmentation {
    let columns = split_columns(region.width(), &layout.columns);

    let mut strips = Vec::new();
    for span in &columns.spans {
        let Some(range) = span.questions else {
            continue;
        };
        for bounds in split_rows(region.height(), range, &layout.rows) {
            let rect = Rect::new(span.x, bounds.y, span.width, bounds.height);
            strips.push(QuestionStrip {
                question: bounds.question,
                bounds: rect,
                image: region.crop_imm(rect.x, rect.y, rect.width, rect.height),
            });
        }
        debug!(
            column = span.index,
            x = span.x,
            width = span.width,
            first = range.start,
            last = range.end,
            "Column segmented"
        );
    }
    strips.sort_by_key(|s| s.question);

    Segmentation { columns, strips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn column(width: u32) -> ColumnConfig {
        ColumnConfig {
            width,
            questions: None,
        }
    }

    #[test]
    fn exact_widths_need_no_adjustment() {
        let split = split_columns(306, &[column(123), column(62), column(121)]);
        assert!(split.adjustment.is_none());
        let xs: Vec<(u32, u32)> = split.spans.iter().map(|s| (s.x, s.width)).collect();
        assert_eq!(xs, vec![(0, 123), (123, 62), (185, 121)]);
    }

    #[test]
    fn narrow_configuration_widens_last_column_by_the_difference() {
        let split = split_columns(306, &[column(123), column(62), column(100)]);
        let adjustment = split.adjustment.unwrap();
        assert_eq!(adjustment.configured_total, 285);
        assert_eq!(adjustment.actual_last, 121);
        assert_eq!(adjustment.actual_last - adjustment.configured_last, 306 - 285);
        assert_eq!(split.spans[2].width, 121);
    }

    #[test]
    fn wide_configuration_never_goes_negative() {
        let split = split_columns(150, &[column(123), column(62), column(121)]);
        let widths: Vec<u32> = split.spans.iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![123, 27, 0]);
        assert_eq!(split.spans[2].x, 150);
        assert!(split.adjustment.is_some());
    }

    #[test]
    fn reference_rows_tile_the_region() {
        let bounds = split_rows(126, QuestionRange::new(1, 10), &RowConfig::default());
        let heights: Vec<u32> = bounds.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![12, 12, 12, 12, 13, 13, 13, 13, 13, 13]);
        assert_eq!(bounds[4].y, 48);
        assert_eq!(bounds[9].y + bounds[9].height, 126);
        assert_eq!(bounds[0].question, 1);
        assert_eq!(bounds[9].question, 10);
    }

    #[test]
    fn truncate_leaves_division_remainder_unassigned() {
        // 130 - 48 = 82 rows for 6 questions: 13 each, 4 rows left over.
        let bounds = split_rows(130, QuestionRange::new(11, 20), &RowConfig::default());
        let last = bounds.last().unwrap();
        assert_eq!(last.question, 20);
        assert_eq!(last.y + last.height, 126);
    }

    #[test]
    fn stretch_last_covers_the_full_group() {
        let rows = RowConfig {
            remainder: RemainderPolicy::StretchLast,
            ..RowConfig::default()
        };
        let bounds = split_rows(130, QuestionRange::new(11, 20), &rows);
        let last = bounds.last().unwrap();
        assert_eq!(last.y + last.height, 130);
        assert_eq!(last.height, 17);
    }

    #[test]
    fn short_group_clamps_and_empties_trailing_strips() {
        let bounds = split_rows(40, QuestionRange::new(1, 6), &RowConfig::default());
        let heights: Vec<u32> = bounds.iter().map(|b| b.height).collect();
        // Fixed strips run past the bottom; remaining step is negative.
        assert_eq!(heights, vec![12, 12, 12, 4, 0, 0]);
        assert!(bounds.iter().all(|b| b.y + b.height <= 40));
    }

    #[test]
    fn fewer_questions_than_fixed_use_fixed_height() {
        let bounds = split_rows(126, QuestionRange::new(1, 3), &RowConfig::default());
        let heights: Vec<u32> = bounds.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![12, 12, 12]);
    }

    #[test]
    fn row_split_is_deterministic() {
        let rows = RowConfig::default();
        let a = split_rows(126, QuestionRange::new(1, 10), &rows);
        let b = split_rows(126, QuestionRange::new(1, 10), &rows);
        assert_eq!(a, b);
    }

    #[test]
    fn reference_layout_yields_twenty_strips() {
        let layout = SheetLayout::default();
        let region = DynamicImage::ImageLuma8(GrayImage::from_pixel(306, 126, Luma([255u8])));
        let segmentation = segment_region(&region, &layout);

        assert_eq!(segmentation.strips.len(), 20);
        let questions: Vec<u32> = segmentation.strips.iter().map(|s| s.question).collect();
        assert_eq!(questions, (1..=20).collect::<Vec<_>>());

        let q11 = &segmentation.strips[10];
        assert_eq!(q11.bounds, Rect::new(185, 0, 121, 12));
        assert_eq!((q11.image.width(), q11.image.height()), (121, 12));
        assert_eq!(q11.name(), "Q_11");
    }
}
