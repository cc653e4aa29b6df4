// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet layout and run configuration.
//
// The default values describe the reference answer sheet: a 342x486 page
// raster whose bubble grid sits 330 px from the top, split into a 10-question
// column on the left, an unused middle column and another 10-question column
// on the right.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OmrError, Result};
use crate::types::QuestionRange;

/// Size every page is resampled to before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterConfig {
    pub width: u32,
    pub height: u32,
    /// Scale applied when rendering PDF pages (1.0 = 72 dpi).
    #[serde(default = "RasterConfig::default_render_scale")]
    pub pdf_render_scale: f32,
}

impl RasterConfig {
    fn default_render_scale() -> f32 {
        1.0
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 342,
            height: 486,
            pdf_render_scale: Self::default_render_scale(),
        }
    }
}

/// Distances in pixels from each page edge to the answer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropOffsets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Default for CropOffsets {
    fn default() -> Self {
        Self {
            top: 330,
            bottom: 30,
            left: 17,
            right: 19,
        }
    }
}

/// One vertical column group of the answer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub width: u32,
    /// Questions printed in this column; `None` for decorative columns.
    #[serde(default)]
    pub questions: Option<QuestionRange>,
}

/// How leftover rows are handled after integer-dividing the remaining height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Leftover rows stay unassigned; each strip's bottom is clamped to the
    /// group height. Matches the calibrated reference geometry.
    #[default]
    Truncate,
    /// The last strip extends down to the bottom of the group.
    StretchLast,
}

/// Per-column row split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowConfig {
    /// Number of leading questions that use `height_per_question`.
    pub fixed_questions: u32,
    pub height_per_question: u32,
    #[serde(default)]
    pub remainder: RemainderPolicy,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            fixed_questions: 4,
            height_per_question: 12,
            remainder: RemainderPolicy::Truncate,
        }
    }
}

/// Complete physical description of one answer-sheet layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub raster: RasterConfig,
    pub crop: CropOffsets,
    pub columns: Vec<ColumnConfig>,
    pub rows: RowConfig,
    /// Option slot labels, left to right. The first is the "nothing marked"
    /// sentinel.
    pub option_labels: Vec<String>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            raster: RasterConfig::default(),
            crop: CropOffsets::default(),
            columns: vec![
                ColumnConfig {
                    width: 123,
                    questions: Some(QuestionRange::new(1, 10)),
                },
                ColumnConfig {
                    width: 62,
                    questions: None,
                },
                ColumnConfig {
                    width: 121,
                    questions: Some(QuestionRange::new(11, 20)),
                },
            ],
            rows: RowConfig::default(),
            option_labels: ["NA", "A", "B", "C", "D"].map(String::from).to_vec(),
        }
    }
}

impl SheetLayout {
    /// Check the layout for values that cannot describe a real sheet.
    pub fn validate(&self) -> Result<()> {
        if self.raster.width == 0 || self.raster.height == 0 {
            return Err(OmrError::InvalidLayout(format!(
                "raster size must be positive, got {}x{}",
                self.raster.width, self.raster.height
            )));
        }
        if !(self.raster.pdf_render_scale.is_finite() && self.raster.pdf_render_scale > 0.0) {
            return Err(OmrError::InvalidLayout(format!(
                "pdf_render_scale must be positive, got {}",
                self.raster.pdf_render_scale
            )));
        }
        if self.columns.is_empty() {
            return Err(OmrError::InvalidLayout("at least one column is required".into()));
        }
        if let Some(index) = self.columns.iter().position(|c| c.width == 0) {
            return Err(OmrError::InvalidLayout(format!(
                "column {} has zero width",
                index + 1
            )));
        }
        if self.rows.height_per_question == 0 {
            return Err(OmrError::InvalidLayout(
                "height_per_question must be positive".into(),
            ));
        }

        let ranges: Vec<QuestionRange> = self.columns.iter().filter_map(|c| c.questions).collect();
        if ranges.is_empty() {
            return Err(OmrError::InvalidLayout(
                "no column carries any questions".into(),
            ));
        }
        for (i, range) in ranges.iter().enumerate() {
            if range.start == 0 || range.is_empty() {
                return Err(OmrError::InvalidLayout(format!(
                    "invalid question range {}..={}",
                    range.start, range.end
                )));
            }
            if let Some(other) = ranges[i + 1..].iter().find(|o| o.overlaps(range)) {
                return Err(OmrError::InvalidLayout(format!(
                    "question ranges {}..={} and {}..={} overlap",
                    range.start, range.end, other.start, other.end
                )));
            }
        }

        if self.option_labels.len() < 2 {
            return Err(OmrError::InvalidLayout(
                "at least two option labels are required".into(),
            ));
        }
        for (i, label) in self.option_labels.iter().enumerate() {
            if label.is_empty() || self.option_labels[..i].contains(label) {
                return Err(OmrError::InvalidLayout(format!(
                    "option label {:?} is empty or duplicated",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Highest question number printed on the sheet.
    pub fn question_capacity(&self) -> u32 {
        self.columns
            .iter()
            .filter_map(|c| c.questions)
            .map(|r| r.end)
            .max()
            .unwrap_or(0)
    }

    /// Whether every question in `1..=n` is printed somewhere on the sheet.
    pub fn covers(&self, num_questions: usize) -> bool {
        let Ok(last) = u32::try_from(num_questions) else {
            return false;
        };
        (1..=last).all(|q| {
            self.columns
                .iter()
                .filter_map(|c| c.questions)
                .any(|r| r.contains(q))
        })
    }
}

/// Execution settings for a grading run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Concurrent page workers; defaults to the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Abort the whole run after this many seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Write page, region and strip images under this directory.
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|w| *w > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Everything needed to grade documents printed with one layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default)]
    pub layout: SheetLayout,
    #[serde(default)]
    pub run: RunConfig,
}

impl GradingConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.layout.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        let layout = SheetLayout::default();
        layout.validate().unwrap();
        assert_eq!(layout.question_capacity(), 20);
        assert!(layout.covers(20));
        assert!(!layout.covers(21));
    }

    #[test]
    fn question_counts_beyond_u32_are_not_covered() {
        let layout = SheetLayout::default();
        assert!(!layout.covers(usize::MAX));
    }

    #[test]
    fn default_columns_fill_the_reference_region() {
        let layout = SheetLayout::default();
        let region_width =
            layout.raster.width - layout.crop.left - layout.crop.right;
        let total: u32 = layout.columns.iter().map(|c| c.width).sum();
        assert_eq!(total, region_width);
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let mut layout = SheetLayout::default();
        layout.columns[2].questions = Some(QuestionRange::new(10, 20));
        assert!(matches!(layout.validate(), Err(OmrError::InvalidLayout(_))));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut layout = SheetLayout::default();
        layout.option_labels = ["NA", "A", "A"].map(String::from).to_vec();
        assert!(matches!(layout.validate(), Err(OmrError::InvalidLayout(_))));
    }

    #[test]
    fn zero_width_column_is_rejected() {
        let mut layout = SheetLayout::default();
        layout.columns[1].width = 0;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn worker_count_falls_back_when_zero() {
        let run = RunConfig {
            workers: Some(0),
            ..RunConfig::default()
        };
        assert!(run.worker_count() >= 1);
        let run = RunConfig {
            workers: Some(3),
            ..RunConfig::default()
        };
        assert_eq!(run.worker_count(), 3);
    }

    #[test]
    fn json_file_round_trip_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let mut config = GradingConfig::default();
        config.layout.rows.remainder = RemainderPolicy::StretchLast;
        config.run.deadline_secs = Some(30);
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();

        let loaded = GradingConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.run.deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: GradingConfig =
            serde_json::from_str(r#"{ "run": { "workers": 2 } }"#).unwrap();
        assert_eq!(config.layout, SheetLayout::default());
        assert_eq!(config.run.workers, Some(2));
    }
}
