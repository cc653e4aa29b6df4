// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-page hot path of omrgrade-sheet: cropping,
// segmentation and classification of a synthetic reference-layout page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use omrgrade_core::SheetLayout;
use omrgrade_sheet::{classify_strip, crop_answer_region, segment_region};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Build a 342x486 white page with a dark block in every question's "A" slot.
fn synthetic_page() -> DynamicImage {
    let mut img = GrayImage::from_pixel(342, 486, Luma([245u8]));
    for y in 330..456 {
        for x in (17 + 24)..(17 + 48) {
            img.put_pixel(x, y, Luma([25u8]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn bench_page_pipeline(c: &mut Criterion) {
    let layout = SheetLayout::default();
    let page = synthetic_page();

    c.bench_function("crop+segment+classify (reference page)", |b| {
        b.iter(|| {
            let region = crop_answer_region(black_box(&page), &layout.crop).unwrap();
            let segmentation = segment_region(&region, &layout);
            for strip in &segmentation.strips {
                black_box(classify_strip(strip, &layout.option_labels).ok());
            }
        });
    });
}

criterion_group!(benches, bench_page_pipeline);
criterion_main!(benches);
