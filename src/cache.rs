//! On-disk copy of a fetched catalog
//!
//! The cache only saves downloads. Deleting the file is always safe and
//! makes the next run fetch the catalog again.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::CardRecord;

pub struct CatalogCache {
    path: PathBuf,
}

impl CatalogCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached catalog, or `None` if nothing has been cached yet
    pub fn load(&self) -> Result<Option<Vec<CardRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open cache: {}", self.path.display()))?;
        let records: Vec<CardRecord> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse cache: {}", self.path.display()))?;
        Ok(Some(records))
    }

    /// Replace the cached catalog with `records`.
    ///
    /// Writes to a temporary sibling first, so a crash mid-write leaves either
    /// the old cache or none at all.
    pub fn save(&self, records: &[CardRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create cache: {}", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, records)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move cache into place: {}", self.path.display()))?;

        log::debug!("Cached {} records in {}", records.len(), self.path.display());
        Ok(())
    }
}
