// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inspection artifacts — page rasters, answer regions, question strips and
// calibration overlays, stored under a page-scoped namespace.
//
// Every artifact is keyed by `(PageId, name)`, so pages processed in parallel
// never write to the same location.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat};
use omrgrade_core::error::{OmrError, Result};
use omrgrade_core::types::PageId;
use tracing::debug;

/// Destination for intermediate images.
pub trait ArtifactSink: Send + Sync {
    /// Store `image` as artifact `name` of `page`.
    fn store(&self, page: PageId, name: &str, image: &DynamicImage) -> Result<()>;

    /// Whether stored images are kept at all. Callers may skip preparing
    /// artifacts when this is false.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Drops every artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardArtifacts;

impl ArtifactSink for DiscardArtifacts {
    fn store(&self, _page: PageId, _name: &str, _image: &DynamicImage) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Writes PNG files to `<root>/page_<n>/<name>.png`.
#[derive(Debug, Clone)]
pub struct DirectoryArtifacts {
    root: PathBuf,
}

impl DirectoryArtifacts {
    /// Create the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|err| {
            OmrError::Artifact(format!("cannot create {}: {}", root.display(), err))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every artifact of `page`.
    pub fn page_dir(&self, page: PageId) -> PathBuf {
        self.root.join(page.to_string())
    }

    /// Full path of artifact `name` of `page`.
    pub fn path_for(&self, page: PageId, name: &str) -> PathBuf {
        self.page_dir(page).join(format!("{name}.png"))
    }
}

impl ArtifactSink for DirectoryArtifacts {
    fn store(&self, page: PageId, name: &str, image: &DynamicImage) -> Result<()> {
        let dir = self.page_dir(page);
        std::fs::create_dir_all(&dir).map_err(|err| {
            OmrError::Artifact(format!("cannot create {}: {}", dir.display(), err))
        })?;
        let path = self.path_for(page, name);
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|err| OmrError::Artifact(format!("failed to save {}: {}", path.display(), err)))?;
        debug!(path = %path.display(), "Artifact written");
        Ok(())
    }
}

/// Keeps PNG-encoded artifacts in memory.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    entries: Mutex<BTreeMap<(PageId, String), Vec<u8>>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// PNG bytes of artifact `name` of `page`.
    pub fn get(&self, page: PageId, name: &str) -> Option<Vec<u8>> {
        self.lock().get(&(page, name.to_string())).cloned()
    }

    /// Names of every artifact stored for `page`, sorted.
    pub fn names(&self, page: PageId) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|(p, _)| *p == page)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(PageId, String), Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactSink for MemoryArtifacts {
    fn store(&self, page: PageId, name: &str, image: &DynamicImage) -> Result<()> {
        let bytes = encode_png(image)?;
        self.lock().insert((page, name.to_string()), bytes);
        Ok(())
    }
}

/// Encode a `DynamicImage` as PNG bytes.
fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| OmrError::Artifact(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}
