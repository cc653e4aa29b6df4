// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mark classifier — pick the darkest option slot of a question strip.
//
// A filled bubble lowers the mean intensity of its slot. The decision is the
// darkest of N slots with no absolute threshold, so an unmarked question is
// read as whichever slot happens to be darkest (normally the "none" slot,
// which holds the question number).

use image::{DynamicImage, GrayImage, Luma};
use omrgrade_core::error::{OmrError, Result};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::geometry::segment::QuestionStrip;

/// Why a strip cannot be split into option slots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("strip is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("strip is {width} px wide, narrower than its {slots} option slots")]
    TooNarrow { width: u32, slots: usize },
}

/// Outcome of classifying one question strip.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkDecision {
    pub question: u32,
    /// Index of the chosen slot, left to right.
    pub slot: usize,
    pub label: String,
    /// Mean grayscale intensity of every slot, left to right.
    pub slot_means: Vec<f64>,
}

/// Horizontal `[start, end)` ranges of `slots` equal-width slots across
/// `width` columns. The last slot absorbs the integer-division remainder.
pub fn slot_ranges(width: u32, slots: usize) -> Vec<(u32, u32)> {
    if slots == 0 {
        return Vec::new();
    }
    let slot_width = width / slots as u32;
    (0..slots as u32)
        .map(|i| {
            let start = i * slot_width;
            let end = if i as usize == slots - 1 {
                width
            } else {
                start + slot_width
            };
            (start, end)
        })
        .collect()
}

/// Grayscale with Rec.601 luma weights (0.299 R + 0.587 G + 0.114 B), in
/// 14-bit fixed point. Alpha is ignored.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
        Luma([luma as u8])
    })
}

/// Mean intensity of each option slot of a grayscale strip.
pub fn slot_means(strip: &GrayImage, slots: usize) -> std::result::Result<Vec<f64>, SlotError> {
    let (width, height) = strip.dimensions();
    if width == 0 || height == 0 || slots == 0 {
        return Err(SlotError::Empty { width, height });
    }
    if (width as usize) < slots {
        return Err(SlotError::TooNarrow { width, slots });
    }

    // Sum each pixel column once, then aggregate per slot.
    let mut column_sums = vec![0u64; width as usize];
    for row in strip.rows() {
        for (x, pixel) in row.enumerate() {
            column_sums[x] += u64::from(pixel.0[0]);
        }
    }

    Ok(slot_ranges(width, slots)
        .into_iter()
        .map(|(start, end)| {
            let total: u64 = column_sums[start as usize..end as usize].iter().sum();
            total as f64 / (f64::from(end - start) * f64::from(height))
        })
        .collect())
}

/// Index of the darkest slot.
///
/// Tie-break: when several slots share the lowest mean, the leftmost one
/// wins. Returns `None` only for an empty slice.
pub fn darkest_slot(means: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &mean) in means.iter().enumerate() {
        match best {
            Some((_, lowest)) if mean >= lowest => {}
            _ => best = Some((index, mean)),
        }
    }
    best.map(|(index, _)| index)
}

/// Classify a grayscale-convertible strip image against `labels`.
pub fn classify_image(
    question: u32,
    image: &DynamicImage,
    labels: &[String],
) -> Result<MarkDecision> {
    let gray = to_gray(image);
    let means = slot_means(&gray, labels.len()).map_err(|err| OmrError::StripLoad {
        question,
        reason: err.to_string(),
    })?;
    let slot = darkest_slot(&means).ok_or_else(|| OmrError::StripLoad {
        question,
        reason: "no option slots".into(),
    })?;

    Ok(MarkDecision {
        question,
        slot,
        label: labels[slot].clone(),
        slot_means: means,
    })
}

/// Classify one question strip.
#[instrument(skip_all, fields(question = strip.question))]
pub fn classify_strip(strip: &QuestionStrip, labels: &[String]) -> Result<MarkDecision> {
    let decision = classify_image(strip.question, &strip.image, labels)?;
    debug!(
        label = %decision.label,
        slot = decision.slot,
        means = ?decision.slot_means,
        "Strip classified"
    );
    Ok(decision)
}
