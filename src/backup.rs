// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Backups taken before a run mutates the vault, and restoring from them
//!
//! A backup is a sibling directory `<vault><suffix>_<timestamp>` holding a
//! copy of the vault (or of the touched files only) under `files/`, plus a
//! `manifest.json` listing every copied file with its blake3 hash and the
//! moves the run went on to make.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::apply::AppliedImage;
use crate::config::{BackupScope, OrganizationConfig};
use crate::plan::OperationPlan;
use crate::{Result, VaultkeeperError};

pub const MANIFEST_FILE: &str = "manifest.json";
const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackedUpFile {
    /// Path relative to the vault root
    pub path: PathBuf,
    pub hash: String,
}

/// A move made by the run, relative to the vault root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub vault_root: PathBuf,
    pub scope: BackupScope,
    pub files: Vec<BackedUpFile>,
    #[serde(default)]
    pub moves: Vec<RecordedMove>,
}

/// A backup on disk
#[derive(Debug)]
pub struct Backup {
    pub dir: PathBuf,
    pub manifest: BackupManifest,
}

impl Backup {
    /// Record the moves a run made, so a restore can undo them
    pub fn record_moves(&mut self, applied: &[AppliedImage]) -> Result<()> {
        let root = self.manifest.vault_root.clone();
        for image in applied {
            self.manifest.moves.push(RecordedMove {
                from: relative_to(&root, &image.from),
                to: relative_to(&root, &image.to),
            });
        }
        write_manifest(&self.dir, &self.manifest)
    }
}

pub struct BackupManager<'a> {
    config: &'a OrganizationConfig,
}

impl<'a> BackupManager<'a> {
    pub fn new(config: &'a OrganizationConfig) -> Self {
        Self { config }
    }

    /// Copy the vault, or the files `plan` touches, into a fresh sibling
    /// directory. Any failure is fatal: the run must not go on to mutate
    /// files it cannot restore.
    pub fn create(&self, root: &Path, plan: &OperationPlan, run_id: &str) -> Result<Backup> {
        let dir = backup_dir(root, &self.config.backup_suffix, Local::now())
            .map_err(|e| VaultkeeperError::Backup(format!("cannot place backup for {:?}: {}", root, e)))?;

        let sources: Vec<PathBuf> = match self.config.backup_scope {
            BackupScope::Full => WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VaultkeeperError::Backup(format!("walking vault: {}", e)))?
                .into_iter()
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect(),
            BackupScope::Touched => plan.touched_paths().into_iter().collect(),
        };

        info!("Creating backup at {:?} ({} file(s))", dir, sources.len());

        let mut files = Vec::with_capacity(sources.len());
        for source in &sources {
            let rel = relative_to(root, source);
            let target = dir.join(FILES_DIR).join(&rel);
            let hash = copy_hashed(source, &target)
                .map_err(|e| VaultkeeperError::Backup(format!("copying {:?}: {}", source, e)))?;
            files.push(BackedUpFile { path: rel, hash });
        }

        let manifest = BackupManifest {
            run_id: run_id.to_string(),
            created_at: Utc::now(),
            vault_root: root.to_path_buf(),
            scope: self.config.backup_scope,
            files,
            moves: Vec::new(),
        };
        write_manifest(&dir, &manifest)?;

        Ok(Backup { dir, manifest })
    }
}

/// Pick a fresh `<vault><suffix>_<YYYYmmdd_HHMMSS>` directory next to the
/// vault and create it
fn backup_dir(root: &Path, suffix: &str, now: DateTime<Local>) -> std::io::Result<PathBuf> {
    let parent = root.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "vault root has no parent directory")
    })?;
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vault".to_string());
    let base = format!("{}{}_{}", name, suffix, now.format("%Y%m%d_%H%M%S"));

    let mut candidate = parent.join(&base);
    let mut counter = 2;
    while candidate.exists() {
        candidate = parent.join(format!("{}_{}", base, counter));
        counter += 1;
    }
    fs::create_dir_all(&candidate)?;
    Ok(candidate)
}

fn copy_hashed(source: &Path, target: &Path) -> std::io::Result<String> {
    let data = fs::read(source)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, &data)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

fn write_manifest(dir: &Path, manifest: &BackupManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(dir.join(MANIFEST_FILE), json)
        .map_err(|e| VaultkeeperError::Backup(format!("writing manifest: {}", e)))
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Read the manifest of a backup directory
pub fn load_manifest(dir: &Path) -> Result<BackupManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| VaultkeeperError::Restore(format!("cannot read {:?}: {}", path, e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// What a restore did, or would do in a dry run
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    /// Files the run created at move destinations
    pub removed: Vec<PathBuf>,
    /// Backed-up copies whose hash no longer matches; left alone
    pub corrupted: Vec<PathBuf>,
}

/// Put the vault back to the state captured in `dir`.
///
/// Files created at move destinations are removed, then every backed-up
/// file whose hash still verifies is copied back to its original place.
pub fn restore(dir: &Path, dry_run: bool) -> Result<RestoreReport> {
    let manifest = load_manifest(dir)?;
    let root = &manifest.vault_root;
    let mut report = RestoreReport::default();

    let backed_up: BTreeSet<&Path> = manifest.files.iter().map(|f| f.path.as_path()).collect();
    for recorded in manifest.moves.iter().rev() {
        let created = root.join(&recorded.to);
        if backed_up.contains(recorded.to.as_path()) || !created.exists() {
            continue;
        }
        if !dry_run {
            fs::remove_file(&created)
                .map_err(|e| VaultkeeperError::Restore(format!("removing {:?}: {}", created, e)))?;
            remove_empty_parents(&created, root);
        }
        report.removed.push(created);
    }

    for file in &manifest.files {
        let copy = dir.join(FILES_DIR).join(&file.path);
        let data = fs::read(&copy)
            .map_err(|e| VaultkeeperError::Restore(format!("reading {:?}: {}", copy, e)))?;
        if blake3::hash(&data).to_hex().as_str() != file.hash {
            warn!("Hash mismatch for backed-up {:?}, not restoring it", file.path);
            report.corrupted.push(file.path.clone());
            continue;
        }

        let target = root.join(&file.path);
        if !dry_run {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &data)?;
        }
        report.restored.push(target);
    }

    Ok(report)
}

fn remove_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StrategyKind};
    use crate::model::NamingDecision;
    use crate::plan::{ImagePlan, PlannedAction};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn vault() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("vault");
        fs::create_dir_all(root.join("Notes")).unwrap();
        fs::write(root.join("img.png"), b"png").unwrap();
        fs::write(root.join("Notes/a.md"), "![[img.png]]").unwrap();
        fs::write(root.join("other.md"), "nothing").unwrap();
        (dir, root)
    }

    fn plan(root: &Path) -> OperationPlan {
        OperationPlan {
            entries: vec![ImagePlan {
                image: 0,
                source: root.join("img.png"),
                destination: root.join("Notes/img.png"),
                decision: NamingDecision::Named {
                    chosen_name: "img.png".to_string(),
                    strategy: StrategyKind::OriginalFilename,
                    rationale: String::new(),
                },
                actions: vec![PlannedAction::Move {
                    from: root.join("img.png"),
                    to: root.join("Notes/img.png"),
                }],
            }],
        }
    }

    #[test]
    fn test_backup_dir_naming() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("MyVault");
        fs::create_dir(&root).unwrap();
        let now = Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let first = backup_dir(&root, "_backup", now).unwrap();
        let second = backup_dir(&root, "_backup", now).unwrap();
        assert_eq!(first, dir.path().join("MyVault_backup_20250304_050607"));
        assert_eq!(second, dir.path().join("MyVault_backup_20250304_050607_2"));
    }

    #[test]
    fn test_full_backup_copies_everything() {
        let (_dir, root) = vault();
        let config = AppConfig::default();
        let backup = BackupManager::new(&config.organization)
            .create(&root, &plan(&root), "run-1")
            .unwrap();

        assert_eq!(backup.manifest.files.len(), 3);
        assert!(backup.dir.join("files/Notes/a.md").exists());
        assert!(backup.dir.join(MANIFEST_FILE).exists());
        assert_eq!(load_manifest(&backup.dir).unwrap().run_id, "run-1");
    }

    #[test]
    fn test_touched_backup_copies_only_plan_files() {
        let (_dir, root) = vault();
        let mut config = AppConfig::default();
        config.organization.backup_scope = BackupScope::Touched;
        let backup = BackupManager::new(&config.organization)
            .create(&root, &plan(&root), "run-2")
            .unwrap();

        assert_eq!(backup.manifest.files.len(), 1);
        assert_eq!(backup.manifest.files[0].path, PathBuf::from("img.png"));
    }

    #[test]
    fn test_restore_undoes_move() {
        let (_dir, root) = vault();
        let config = AppConfig::default();
        let mut backup = BackupManager::new(&config.organization)
            .create(&root, &plan(&root), "run-3")
            .unwrap();

        fs::create_dir_all(root.join("Notes/sub")).unwrap();
        fs::rename(root.join("img.png"), root.join("Notes/sub/img.png")).unwrap();
        fs::write(root.join("Notes/a.md"), "![[sub/img.png]]").unwrap();
        backup
            .record_moves(&[AppliedImage {
                from: root.join("img.png"),
                to: root.join("Notes/sub/img.png"),
                rewrites: 1,
            }])
            .unwrap();

        let preview = restore(&backup.dir, true).unwrap();
        assert_eq!(preview.removed.len(), 1);
        assert!(root.join("Notes/sub/img.png").exists());

        let report = restore(&backup.dir, false).unwrap();
        assert_eq!(report.restored.len(), 3);
        assert!(report.corrupted.is_empty());
        assert!(root.join("img.png").exists());
        assert!(!root.join("Notes/sub").exists());
        assert_eq!(fs::read_to_string(root.join("Notes/a.md")).unwrap(), "![[img.png]]");
    }

    #[test]
    fn test_backup_failure_is_fatal_error() {
        let config = AppConfig::default();
        let err = BackupManager::new(&config.organization)
            .create(Path::new("/"), &OperationPlan::default(), "run-4")
            .unwrap_err();
        assert!(matches!(err, VaultkeeperError::Backup(_)));
    }
}
