// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region cropper — cut the bubble grid out of a page using fixed offsets.

use image::DynamicImage;
use omrgrade_core::config::CropOffsets;
use omrgrade_core::error::{OmrError, Result};
use omrgrade_core::types::Rect;
use tracing::{debug, instrument};

/// Rectangle `[top, height - bottom) x [left, width - right)` of a
/// `width` x `height` page.
///
/// Fails with [`OmrError::EmptyRegion`] when the offsets leave no area.
pub fn answer_rect(width: u32, height: u32, offsets: &CropOffsets) -> Result<Rect> {
    let x1 = i64::from(offsets.left);
    let y1 = i64::from(offsets.top);
    let x2 = i64::from(width) - i64::from(offsets.right);
    let y2 = i64::from(height) - i64::from(offsets.bottom);

    let region_w = x2 - x1;
    let region_h = y2 - y1;
    if region_w <= 0 || region_h <= 0 {
        return Err(OmrError::EmptyRegion {
            width: region_w,
            height: region_h,
        });
    }

    Ok(Rect::new(
        offsets.left,
        offsets.top,
        region_w as u32,
        region_h as u32,
    ))
}

/// Crop the answer region from a page image.
#[instrument(skip_all, fields(page_w = page.width(), page_h = page.height()))]
pub fn crop_answer_region(page: &DynamicImage, offsets: &CropOffsets) -> Result<DynamicImage> {
    let rect = answer_rect(page.width(), page.height(), offsets)?;
    debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "Cropping answer region"
    );
    Ok(page.crop_imm(rect.x, rect.y, rect.width, rect.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn reference_offsets_give_reference_region() {
        let rect = answer_rect(342, 486, &CropOffsets::default()).unwrap();
        assert_eq!(rect, Rect::new(17, 330, 306, 126));
    }

    #[test]
    fn offsets_exceeding_page_are_empty() {
        let offsets = CropOffsets {
            top: 400,
            bottom: 100,
            left: 0,
            right: 0,
        };
        match answer_rect(342, 486, &offsets) {
            Err(OmrError::EmptyRegion { width, height }) => {
                assert_eq!(width, 342);
                assert_eq!(height, -14);
            }
            other => panic!("expected EmptyRegion, got {other:?}"),
        }
    }

    #[test]
    fn zero_width_region_is_empty() {
        let offsets = CropOffsets {
            top: 0,
            bottom: 0,
            left: 5,
            right: 5,
        };
        assert!(answer_rect(10, 10, &offsets).is_err());
    }

    #[test]
    fn crop_copies_the_expected_pixels() {
        let mut page = GrayImage::from_pixel(40, 30, Luma([255u8]));
        page.put_pixel(5, 3, Luma([7u8]));
        let offsets = CropOffsets {
            top: 3,
            bottom: 2,
            left: 5,
            right: 4,
        };
        let region = crop_answer_region(&DynamicImage::ImageLuma8(page), &offsets).unwrap();
        assert_eq!((region.width(), region.height()), (31, 25));
        assert_eq!(region.to_luma8().get_pixel(0, 0).0[0], 7);
    }
}
