// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Calibration overlay — draw the column, strip and chosen-slot boundaries on
// top of the answer region so a layout can be checked against real scans.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;

use crate::geometry::segment::Segmentation;
use crate::marks::classify::{MarkDecision, slot_ranges};

const COLUMN_COLOUR: Rgb<u8> = Rgb([40, 90, 220]);
const STRIP_COLOUR: Rgb<u8> = Rgb([40, 170, 60]);
const CHOICE_COLOUR: Rgb<u8> = Rgb([220, 30, 30]);

/// Render the segmentation and decisions over a colour copy of the region.
pub fn render_overlay(
    region: &DynamicImage,
    segmentation: &Segmentation,
    decisions: &[MarkDecision],
    slots: usize,
) -> RgbImage {
    let mut canvas = region.to_rgb8();
    let region_height = canvas.height();

    for span in &segmentation.columns.spans {
        draw_box(&mut canvas, span.x, 0, span.width, region_height, COLUMN_COLOUR);
    }

    for strip in &segmentation.strips {
        let b = strip.bounds;
        draw_box(&mut canvas, b.x, b.y, b.width, b.height, STRIP_COLOUR);

        let chosen = decisions
            .iter()
            .find(|d| d.question == strip.question)
            .and_then(|d| slot_ranges(b.width, slots).get(d.slot).copied());
        if let Some((start, end)) = chosen {
            draw_box(
                &mut canvas,
                b.x + start,
                b.y,
                end - start,
                b.height,
                CHOICE_COLOUR,
            );
        }
    }

    canvas
}

fn draw_box(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, colour: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    let rect = DrawRect::at(x as i32, y as i32).of_size(width, height);
    draw_hollow_rect_mut(canvas, rect, colour);
}
