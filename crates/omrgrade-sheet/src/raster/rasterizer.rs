// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer — render or decode every page of an answer-sheet document and
// resample it to the fixed raster size the layout was calibrated for. PDFs
// are rendered with the pure-Rust `hayro` renderer; raster images are decoded
// with the `image` crate.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use omrgrade_core::config::RasterConfig;
use omrgrade_core::error::{OmrError, Result};
use omrgrade_core::types::{DocumentType, PageId};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// One page of a document, resampled to the layout's raster size.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    /// Image identifier used in the report (`page_3.png` or the source file
    /// name for image inputs).
    pub name: String,
    pub image: DynamicImage,
}

/// All pages of a document plus the digest of its bytes.
#[derive(Debug)]
pub struct LoadedDocument {
    pub pages: Vec<Page>,
    pub sha256: String,
}

/// Converts documents into fixed-size page rasters.
///
/// ```ignore
/// let doc = Rasterizer::new(layout.raster).load("sheets.pdf")?;
/// for page in doc.pages { /* crop, segment, classify */ }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    config: RasterConfig,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    /// Target `(width, height)` of every produced page.
    pub fn target_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    // -- Loading --------------------------------------------------------------

    /// Load a PDF, a single image, or a directory of images.
    ///
    /// Any unreadable input is fatal: no pages are returned unless every page
    /// could be produced.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedDocument> {
        let path = path.as_ref();
        if path.is_dir() {
            return self.load_directory(path);
        }

        let data = std::fs::read(path).map_err(|err| {
            OmrError::DocumentRead(format!("failed to open {}: {}", path.display(), err))
        })?;
        let sha256 = hex::encode(Sha256::digest(&data));
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page_1.png".to_string());

        let pages = self.rasterize_bytes(&data, &source_name)?;
        info!(pages = pages.len(), "Document rasterized");
        Ok(LoadedDocument { pages, sha256 })
    }

    /// Rasterize an in-memory document. PDFs yield one page per PDF page,
    /// anything else is decoded as a single image named `source_name`.
    pub fn rasterize_bytes(&self, data: &[u8], source_name: &str) -> Result<Vec<Page>> {
        match DocumentType::sniff(data) {
            Some(DocumentType::Pdf) => {
                let start = DocumentType::pdf_header_offset(data).unwrap_or(0);
                if start > 0 {
                    debug!(skipped = start, "Ignoring bytes before the PDF header");
                }
                self.rasterize_pdf(data[start..].to_vec())
            }
            _ => Ok(vec![self.rasterize_image(data, PageId(1), source_name)?]),
        }
    }

    /// Render each PDF page and resample it to the target size.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn rasterize_pdf(&self, data: Vec<u8>) -> Result<Vec<Page>> {
        let pdf = hayro::Pdf::new(Arc::new(data))
            .map_err(|err| OmrError::DocumentRead(format!("failed to parse PDF: {:?}", err)))?;

        let pdf_pages = pdf.pages();
        if pdf_pages.is_empty() {
            return Err(OmrError::DocumentRead("PDF has no pages".into()));
        }

        let scale = self.config.pdf_render_scale;
        let interpreter_settings = hayro::InterpreterSettings::default();
        let render_settings = hayro::RenderSettings {
            x_scale: scale,
            y_scale: scale,
            ..Default::default()
        };

        let mut pages = Vec::with_capacity(pdf_pages.len());
        for (index, pdf_page) in pdf_pages.iter().enumerate() {
            let id = PageId::from_index(index);

            let media_box = pdf_page.media_box();
            let width = media_box.x1 - media_box.x0;
            let height = media_box.y1 - media_box.y0;
            if width <= 0.0 || height <= 0.0 {
                return Err(OmrError::DocumentRead(format!(
                    "{id} has an invalid size: {width}x{height}"
                )));
            }

            let pixmap = hayro::render(pdf_page, &interpreter_settings, &render_settings);
            let rendered = flatten_onto_white(
                u32::from(pixmap.width()),
                u32::from(pixmap.height()),
                pixmap.data_as_u8_slice(),
            )
            .ok_or_else(|| OmrError::DocumentRead(format!("failed to render {id}")))?;

            debug!(
                page = id.number(),
                rendered_w = rendered.width(),
                rendered_h = rendered.height(),
                "PDF page rendered"
            );

            pages.push(Page {
                id,
                name: format!("{id}.png"),
                image: self.resample(DynamicImage::ImageRgb8(rendered)),
            });
        }
        Ok(pages)
    }

    /// Decode a single raster image as one page.
    pub fn rasterize_image(&self, data: &[u8], id: PageId, name: &str) -> Result<Page> {
        let image = image::load_from_memory(data).map_err(|err| {
            OmrError::DocumentRead(format!("failed to decode image {}: {}", name, err))
        })?;
        if image.width() == 0 || image.height() == 0 {
            return Err(OmrError::DocumentRead(format!("image {name} is empty")));
        }
        debug!(
            page = id.number(),
            width = image.width(),
            height = image.height(),
            "Image page decoded"
        );
        Ok(Page {
            id,
            name: name.to_string(),
            image: self.resample(image),
        })
    }

    /// Treat every supported image in `dir` as one page, ordered by file name
    /// (digit runs compare numerically, so `page_2` precedes `page_10`).
    fn load_directory(&self, dir: &Path) -> Result<LoadedDocument> {
        let entries = std::fs::read_dir(dir).map_err(|err| {
            OmrError::DocumentRead(format!("failed to list {}: {}", dir.display(), err))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                OmrError::DocumentRead(format!("failed to list {}: {}", dir.display(), err))
            })?;
            let path = entry.path();
            let is_raster = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(DocumentType::from_extension)
                .is_some_and(|kind| kind.is_raster());
            if path.is_file() && is_raster {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(OmrError::DocumentRead(format!(
                "no images found in {}",
                dir.display()
            )));
        }
        files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

        let mut hasher = Sha256::new();
        let mut pages = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let data = std::fs::read(file).map_err(|err| {
                OmrError::DocumentRead(format!("failed to open {}: {}", file.display(), err))
            })?;
            hasher.update(&data);
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            pages.push(self.rasterize_image(&data, PageId::from_index(index), &name)?);
        }

        info!(pages = pages.len(), "Image folder rasterized");
        Ok(LoadedDocument {
            pages,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    // -- Resampling -----------------------------------------------------------

    /// Resize to exactly the target size, ignoring aspect ratio. Uses Lanczos3
    /// filtering.
    pub fn resample(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = self.target_size();
        if image.width() == width && image.height() == height {
            return image;
        }
        image.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Composite premultiplied RGBA pixels over a white background.
fn flatten_onto_white(width: u32, height: u32, rgba: &[u8]) -> Option<RgbImage> {
    if width == 0 || height == 0 || rgba.len() != (width as usize * height as usize * 4) {
        return None;
    }
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in rgba.chunks_exact(4) {
        let background = 255 - px[3];
        rgb.push(px[0].saturating_add(background));
        rgb.push(px[1].saturating_add(background));
        rgb.push(px[2].saturating_add(background));
    }
    RgbImage::from_raw(width, height, rgb)
}

/// Compare strings so that embedded digit runs order numerically.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_number(&mut left);
                let rn = take_number(&mut right);
                let ord = ln
                    .trim_start_matches('0')
                    .len()
                    .cmp(&rn.trim_start_matches('0').len())
                    .then_with(|| ln.trim_start_matches('0').cmp(rn.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(RasterConfig::default())
    }

    #[test]
    fn image_is_resampled_to_target_size() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(684, 972, Luma([200u8])));
        let pages = rasterizer().rasterize_bytes(&png_bytes(&img), "scan.png").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, PageId(1));
        assert_eq!(pages[0].name, "scan.png");
        assert_eq!(pages[0].image.width(), 342);
        assert_eq!(pages[0].image.height(), 486);
    }

    #[test]
    fn garbage_bytes_are_a_document_read_error() {
        let err = rasterizer().rasterize_bytes(b"not an image", "x.png").unwrap_err();
        assert!(matches!(err, OmrError::DocumentRead(_)));
    }

    /// One 342x486 pt page with a black 50x50 square at (100, 100).
    fn one_page_pdf() -> Vec<u8> {
        let content = "0 g\n100 100 50 50 re f\n";
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 342 486] /Contents 4 0 R /Resources << >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (index, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn assert_square_page(pages: &[Page]) {
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.id, PageId(1));
        assert_eq!(page.name, "page_1.png");
        assert_eq!((page.image.width(), page.image.height()), (342, 486));

        let gray = page.image.to_luma8();
        assert!(gray.get_pixel(10, 10).0[0] > 250, "background should be white");
        // PDF y runs upward: the square spans rows 486-150..486-100.
        assert!(gray.get_pixel(125, 360).0[0] < 5, "square should be black");
        assert!(gray.get_pixel(125, 120).0[0] > 250);
    }

    #[test]
    fn pdf_page_is_rendered_at_raster_size() {
        let pages = rasterizer().rasterize_bytes(&one_page_pdf(), "sheets.pdf").unwrap();
        assert_square_page(&pages);
    }

    #[test]
    fn pdf_with_leading_bytes_is_still_rendered() {
        let mut data = b"Content-Type: application/pdf\r\n\r\n".to_vec();
        data.extend_from_slice(&one_page_pdf());
        let pages = rasterizer().rasterize_bytes(&data, "sheets.pdf").unwrap();
        assert_square_page(&pages);
    }

    #[test]
    fn flattening_composites_premultiplied_pixels_onto_white() {
        // Opaque black, fully transparent, half-transparent premultiplied red.
        let rgba = [0, 0, 0, 255, 0, 0, 0, 0, 128, 0, 0, 128];
        let rgb = flatten_onto_white(3, 1, &rgba).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(2, 0).0, [255, 127, 127]);
        assert!(flatten_onto_white(2, 1, &rgba).is_none());
    }

    #[test]
    fn broken_pdf_is_a_document_read_error() {
        let err = rasterizer()
            .rasterize_bytes(b"%PDF-1.7\nthis is not a pdf body", "x.pdf")
            .unwrap_err();
        assert!(matches!(err, OmrError::DocumentRead(_)));
    }

    #[test]
    fn missing_file_is_a_document_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = rasterizer().load(dir.path().join("absent.pdf")).unwrap_err();
        assert!(matches!(err, OmrError::DocumentRead(_)));
    }

    #[test]
    fn directory_pages_follow_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("page_10.png", 10u8), ("page_2.png", 2), ("page_1.png", 1)] {
            GrayImage::from_pixel(342, 486, Luma([shade]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let doc = rasterizer().load(dir.path()).unwrap();
        let names: Vec<&str> = doc.pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["page_1.png", "page_2.png", "page_10.png"]);
        assert_eq!(doc.pages[2].id, PageId(3));
        assert_eq!(doc.sha256.len(), 64);
    }

    #[test]
    fn empty_directory_is_a_document_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            rasterizer().load(dir.path()),
            Err(OmrError::DocumentRead(_))
        ));
    }

    #[test]
    fn flatten_composites_transparent_pixels_to_white() {
        let rgba = [0, 0, 0, 0, 10, 20, 30, 255];
        let rgb = flatten_onto_white(2, 1, &rgba).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
        assert!(flatten_onto_white(3, 1, &rgba).is_none());
    }

    #[test]
    fn natural_ordering() {
        assert_eq!(natural_cmp("page_2.png", "page_10.png"), Ordering::Less);
        assert_eq!(natural_cmp("page_10.png", "page_9.png"), Ordering::Greater);
        assert_eq!(natural_cmp("a.png", "b.png"), Ordering::Less);
        assert_eq!(natural_cmp("q007", "q7"), Ordering::Equal);
    }
}
