//! File staging: copying user-selected files into the application-owned tree

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::errors::{AutomationError, Result};
use crate::types::StagedFile;

/// Copies user files into the staging tree and resolves them back
///
/// Staged files get a stable relative identifier (`category/subcategory/
/// name_disambiguator`) that the record store can persist; the absolute
/// location is recomputed at automation time so the tree can move with the
/// application data directory.
pub struct FileStagingService {
    root: PathBuf,
}

impl FileStagingService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root of the staging tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `source` into `<root>/<category>/<subcategory>/` and return its
    /// staged identity
    ///
    /// The destination name carries a millisecond-timestamp disambiguator;
    /// an existing file with the same disambiguator is never overwritten
    /// (the suffix is bumped instead).
    pub fn stage(&self, source: &Path, category: &str, subcategory: &str) -> Result<StagedFile> {
        if !source.is_file() {
            return Err(AutomationError::FileNotFound(source.to_path_buf()));
        }
        validate_segment(category)?;
        validate_segment(subcategory)?;

        let dir = self.root.join(category).join(subcategory);
        fs::create_dir_all(&dir)
            .map_err(|e| anyhow::anyhow!("failed to create staging directory {:?}: {}", dir, e))?;

        let original_filename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("source path has no file name: {:?}", source))?;
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let extension = source.extension().map(|e| e.to_string_lossy().to_string());

        let disambiguator = Utc::now().timestamp_millis();
        let (dest, staged_name) = unique_destination(&dir, &stem, extension.as_deref(), disambiguator);

        fs::copy(source, &dest)
            .map_err(|e| anyhow::anyhow!("failed to copy {:?} to {:?}: {}", source, dest, e))?;

        let relative_path = format!("{}/{}/{}", category, subcategory, staged_name);
        info!("Staged {:?} as {}", source, relative_path);

        Ok(StagedFile {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            relative_path,
            original_filename,
        })
    }

    /// Resolve a staged relative identifier to a platform-native absolute path
    ///
    /// Fails with `StagedFileMissing` when the staged copy no longer exists,
    /// so consumers abort explicitly instead of handing a dead path to the
    /// browser.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let mut absolute = self.root.clone();
        for segment in relative_path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(AutomationError::StagedFileMissing(relative_path.to_string()));
            }
            absolute.push(segment);
        }

        if !absolute.is_file() {
            debug!("Staged file {} not found at {:?}", relative_path, absolute);
            return Err(AutomationError::StagedFileMissing(relative_path.to_string()));
        }
        Ok(absolute)
    }

    /// Resolve a batch of staged identifiers, failing on the first missing one
    pub fn resolve_all(&self, relative_paths: &[String]) -> Result<Vec<PathBuf>> {
        relative_paths
            .iter()
            .map(|rel| self.resolve(rel))
            .collect()
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(AutomationError::IncompleteTaskData(format!(
            "invalid staging category segment: {:?}",
            segment
        )));
    }
    Ok(())
}

fn unique_destination(
    dir: &Path,
    stem: &str,
    extension: Option<&str>,
    disambiguator: i64,
) -> (PathBuf, String) {
    let mut bump = 0u32;
    loop {
        let name = match (extension, bump) {
            (Some(ext), 0) => format!("{}_{}.{}", stem, disambiguator, ext),
            (Some(ext), n) => format!("{}_{}-{}.{}", stem, disambiguator, n, ext),
            (None, 0) => format!("{}_{}", stem, disambiguator),
            (None, n) => format!("{}_{}-{}", stem, disambiguator, n),
        };
        let candidate = dir.join(&name);
        if !candidate.exists() {
            return (candidate, name);
        }
        bump += 1;
    }
}

#[cfg(test)]
#[path = "staging_test.rs"]
mod staging_test;
