// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vault index: the notes and images found under the vault root
//!
//! The index is a snapshot taken once per run. It owns every [`Reference`]
//! and [`ImageFile`] of the run; later stages refer to them by id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::AppConfig;
use crate::model::{ImageFile, ImageId, Reference, ReferenceId};
use crate::{Result, VaultkeeperError};

/// An image file present on disk at scan time
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
}

/// Snapshot of a vault for the duration of one run
#[derive(Debug)]
pub struct VaultIndex {
    root: PathBuf,
    notes: Vec<PathBuf>,
    files: Vec<IndexedFile>,
    by_path: HashMap<PathBuf, usize>,
    by_name: HashMap<String, Vec<usize>>,
    references: Vec<Reference>,
    images: Vec<ImageFile>,
    image_by_file: HashMap<usize, ImageId>,
}

impl VaultIndex {
    /// Walk the vault root and index notes and supported images.
    ///
    /// Fails only if the root itself is missing or unreadable.
    pub fn build(root: &Path, config: &AppConfig) -> Result<Self> {
        let root = check_root(root)?;

        let excludes = config
            .vault
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut index = Self {
            root: root.clone(),
            notes: Vec::new(),
            files: Vec::new(),
            by_path: HashMap::new(),
            by_name: HashMap::new(),
            references: Vec::new(),
            images: Vec::new(),
            image_by_file: HashMap::new(),
        };

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e) && !is_excluded(e, &root, &excludes));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable vault entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if config.vault.is_note(&path) {
                index.notes.push(path);
                continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !config.image.is_supported(ext) {
                continue;
            }
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            index.insert_file(IndexedFile {
                extension: ext.to_string(),
                path,
                size,
            });
        }

        debug!(
            "Indexed {} notes and {} images under {:?}",
            index.notes.len(),
            index.files.len(),
            index.root
        );
        Ok(index)
    }

    fn insert_file(&mut self, file: IndexedFile) {
        let idx = self.files.len();
        if let Some(name) = file.path.file_name() {
            self.by_name
                .entry(name.to_string_lossy().to_lowercase())
                .or_default()
                .push(idx);
        }
        self.by_path.insert(file.path.clone(), idx);
        self.files.push(file);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Notes in scan order (lexicographic by path)
    pub fn notes(&self) -> &[PathBuf] {
        &self.notes
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file(&self, idx: usize) -> &IndexedFile {
        &self.files[idx]
    }

    /// Image file at exactly `path`
    pub fn file_at(&self, path: &Path) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// Image files whose file name matches `name`, ignoring case
    pub fn files_named(&self, name: &str) -> &[usize] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record a resolved reference, attaching it to the image it points at
    pub fn record(&mut self, reference: Reference, file_idx: usize) -> ReferenceId {
        let ref_id = self.references.len();
        self.references.push(reference);

        let image_id = match self.image_by_file.get(&file_idx) {
            Some(id) => *id,
            None => {
                let file = &self.files[file_idx];
                let id = self.images.len();
                self.images.push(ImageFile {
                    current_path: file.path.clone(),
                    size: file.size,
                    extension: file.extension.clone(),
                    referencing: Vec::new(),
                });
                self.image_by_file.insert(file_idx, id);
                id
            }
        };
        self.images[image_id].referencing.push(ref_id);
        ref_id
    }

    pub fn reference(&self, id: ReferenceId) -> &Reference {
        &self.references[id]
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn image(&self, id: ImageId) -> &ImageFile {
        &self.images[id]
    }

    /// Referenced images, in order of first reference
    pub fn images(&self) -> &[ImageFile] {
        &self.images
    }

    pub fn relative(&self, path: &Path) -> String {
        crate::paths::display_relative(&self.root, path)
    }
}

fn check_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(VaultkeeperError::VaultRoot(format!("{} does not exist", root.display())));
    }
    if !root.is_dir() {
        return Err(VaultkeeperError::VaultRoot(format!("{} is not a directory", root.display())));
    }
    std::fs::read_dir(root)
        .map_err(|e| VaultkeeperError::VaultRoot(format!("{} is not readable: {}", root.display(), e)))?;
    root.canonicalize()
        .map_err(|e| VaultkeeperError::VaultRoot(format!("{}: {}", root.display(), e)))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

fn is_excluded(entry: &DirEntry, root: &Path, excludes: &[glob::Pattern]) -> bool {
    if excludes.is_empty() || entry.depth() == 0 {
        return false;
    }
    let relative = crate::paths::display_relative(root, entry.path());
    excludes.iter().any(|p| p.matches(&relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_build_indexes_notes_and_images() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "a/note.md");
        touch(dir.path(), "img.PNG");
        touch(dir.path(), "a/photo.jpg");
        touch(dir.path(), "a/doc.pdf");
        touch(dir.path(), ".obsidian/cache.png");

        let index = VaultIndex::build(dir.path(), &AppConfig::default()).unwrap();
        let root = index.root().to_path_buf();

        assert_eq!(index.notes(), &[root.join("a/note.md"), root.join("b.md")]);
        assert_eq!(index.file_count(), 2);
        assert_eq!(index.files_named("IMG.png").len(), 1);
        assert!(index.file_at(&root.join("a/photo.jpg")).is_some());
        assert!(index.files_named("cache.png").is_empty());
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "templates/t.md");
        touch(dir.path(), "keep.md");

        let mut config = AppConfig::default();
        config.vault.exclude = vec!["templates".to_string()];
        let index = VaultIndex::build(dir.path(), &config).unwrap();
        assert_eq!(index.notes().len(), 1);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = VaultIndex::build(&dir.path().join("nope"), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, VaultkeeperError::VaultRoot(_)));
    }
}
