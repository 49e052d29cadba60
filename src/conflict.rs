// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Destination name deconfliction
//!
//! A name is free in a directory when no file of that name exists there
//! and no other image of this run has claimed it. Names compare
//! case-insensitively so that plans stay valid on case-insensitive
//! filesystems.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Issue, IssueKind};

pub struct ConflictResolver {
    max_attempts: u32,
    listings: HashMap<PathBuf, HashSet<String>>,
    claimed: HashMap<PathBuf, HashSet<String>>,
}

impl ConflictResolver {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            listings: HashMap::new(),
            claimed: HashMap::new(),
        }
    }

    /// Claim a unique path for `candidate` in `dir`.
    ///
    /// `current` is the image's own location: a candidate equal to it is
    /// free, since the image would simply stay where it is.
    pub fn claim(&mut self, dir: &Path, candidate: &str, current: &Path) -> Result<PathBuf, Issue> {
        let (stem, extension) = split_name(candidate);

        for attempt in 0..=self.max_attempts {
            let name = if attempt == 0 {
                candidate.to_string()
            } else {
                suffixed(stem, extension, attempt + 1)
            };
            let path = dir.join(&name);

            if self.is_free(dir, &name, &path, current) {
                if attempt > 0 {
                    debug!("{} taken in {:?}, using {}", candidate, dir, name);
                }
                self.claimed.entry(dir.to_path_buf()).or_default().insert(name.to_lowercase());
                return Ok(path);
            }
        }

        Err(Issue::new(
            IssueKind::ConflictUnresolvable,
            current,
            format!(
                "no free name for '{}' in {} after {} attempts",
                candidate,
                dir.display(),
                self.max_attempts
            ),
        ))
    }

    fn is_free(&mut self, dir: &Path, name: &str, path: &Path, current: &Path) -> bool {
        let key = name.to_lowercase();
        if self.claimed.get(dir).is_some_and(|names| names.contains(&key)) {
            return false;
        }
        if same_entry(path, current) {
            return true;
        }
        !self.listing(dir).contains(&key)
    }

    fn listing(&mut self, dir: &Path) -> &HashSet<String> {
        self.listings.entry(dir.to_path_buf()).or_insert_with(|| {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.file_name().to_string_lossy().to_lowercase())
                        .collect()
                })
                .unwrap_or_default()
        })
    }
}

fn same_entry(a: &Path, b: &Path) -> bool {
    a.parent() == b.parent()
        && a.file_name()
            .zip(b.file_name())
            .is_some_and(|(x, y)| x.to_string_lossy().to_lowercase() == y.to_string_lossy().to_lowercase())
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn suffixed(stem: &str, extension: Option<&str>, n: u32) -> String {
    match extension {
        Some(ext) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", stem, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_claims_within_run_are_respected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("Notes");
        let mut resolver = ConflictResolver::new(10);

        let a = resolver.claim(&dest, "diagram.png", &dir.path().join("a.png")).unwrap();
        let b = resolver.claim(&dest, "diagram.png", &dir.path().join("b.png")).unwrap();
        let c = resolver.claim(&dest, "Diagram.png", &dir.path().join("c.png")).unwrap();

        assert_eq!(a, dest.join("diagram.png"));
        assert_eq!(b, dest.join("diagram_2.png"));
        assert_eq!(c, dest.join("Diagram_3.png"));
    }

    #[test]
    fn test_existing_files_are_avoided() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("chart.png"), b"x").unwrap();
        std::fs::write(dir.path().join("chart_2.png"), b"x").unwrap();
        let mut resolver = ConflictResolver::new(10);

        let path = resolver.claim(dir.path(), "chart.png", Path::new("/elsewhere/img.png")).unwrap();
        assert_eq!(path, dir.path().join("chart_3.png"));
    }

    #[test]
    fn test_own_location_is_free() {
        let dir = TempDir::new().unwrap();
        let own = dir.path().join("chart.png");
        std::fs::write(&own, b"x").unwrap();
        let mut resolver = ConflictResolver::new(10);

        assert_eq!(resolver.claim(dir.path(), "chart.png", &own).unwrap(), own);
    }

    #[test]
    fn test_exhausted_attempts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.png"), b"x").unwrap();
        std::fs::write(dir.path().join("x_2.png"), b"x").unwrap();
        let mut resolver = ConflictResolver::new(1);

        let issue = resolver.claim(dir.path(), "x.png", Path::new("/other/y.png")).unwrap_err();
        assert_eq!(issue.kind, IssueKind::ConflictUnresolvable);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.b.png"), ("a.b", Some("png")));
        assert_eq!(split_name(".hidden"), (".hidden", None));
        assert_eq!(suffixed("noext", None, 2), "noext_2");
    }
}
