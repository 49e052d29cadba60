// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image resolver
//!
//! Turns a reference target into one indexed image file. Resolution order:
//!
//! 1. relative to the referencing note's directory
//! 2. relative to the vault root
//! 3. unique case-insensitive file name match anywhere in the vault
//!
//! Several files sharing the bare name is reported as ambiguous; the
//! resolver never guesses.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::model::Reference;
use crate::paths::normalize;
use crate::vault::VaultIndex;

/// How a reference was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    NoteRelative,
    VaultRelative,
    NameSearch,
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Index of the file in the vault index
    Found { file: usize, via: ResolvedVia },
    NotFound,
    Ambiguous(Vec<PathBuf>),
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found { via, .. } => write!(f, "resolved ({:?})", via),
            Resolution::NotFound => f.write_str("no matching image in the vault"),
            Resolution::Ambiguous(candidates) => {
                let list: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
                write!(f, "ambiguous, candidates: {}", list.join(", "))
            }
        }
    }
}

/// Resolves references against a [`VaultIndex`] snapshot
pub struct ImageResolver<'a> {
    index: &'a VaultIndex,
}

impl<'a> ImageResolver<'a> {
    pub fn new(index: &'a VaultIndex) -> Self {
        Self { index }
    }

    pub fn resolve(&self, reference: &Reference) -> Resolution {
        let target = reference.decoded_target();
        let target = target.trim().replace('\\', "/");
        if target.is_empty() || target.contains("://") {
            return Resolution::NotFound;
        }

        let root = self.index.root();
        let relative = target.trim_start_matches('/');

        if !target.starts_with('/') {
            if let Some(note_dir) = reference.source_note.parent() {
                if let Some(file) = self.lookup(&note_dir.join(relative), root) {
                    return Resolution::Found { file, via: ResolvedVia::NoteRelative };
                }
            }
        }

        if let Some(file) = self.lookup(&root.join(relative), root) {
            return Resolution::Found { file, via: ResolvedVia::VaultRelative };
        }

        let Some(name) = Path::new(relative).file_name().and_then(|n| n.to_str()) else {
            return Resolution::NotFound;
        };
        match self.index.files_named(name) {
            [] => Resolution::NotFound,
            [only] => Resolution::Found { file: *only, via: ResolvedVia::NameSearch },
            many => Resolution::Ambiguous(
                many.iter().map(|idx| self.index.file(*idx).path.clone()).collect(),
            ),
        }
    }

    fn lookup(&self, candidate: &Path, root: &Path) -> Option<usize> {
        let candidate = normalize(candidate);
        if !candidate.starts_with(root) {
            return None;
        }
        self.index.file_at(&candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::SyntaxKind;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn reference(note: PathBuf, target: &str) -> Reference {
        let raw = format!("![[{}]]", target);
        Reference {
            source_note: note,
            target_text: target.to_string(),
            target_span: 3..3 + target.len(),
            span: 0..raw.len(),
            raw_text: raw,
            syntax: SyntaxKind::WikiEmbed,
            alt_text: None,
            line: 1,
            context: String::new(),
        }
    }

    #[test]
    fn test_resolution_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Notes/a.png");
        touch(dir.path(), "a.png");
        touch(dir.path(), "assets/unique.png");
        touch(dir.path(), "Notes/n.md");

        let index = VaultIndex::build(dir.path(), &AppConfig::default()).unwrap();
        let root = index.root().to_path_buf();
        let note = root.join("Notes/n.md");
        let resolver = ImageResolver::new(&index);

        match resolver.resolve(&reference(note.clone(), "a.png")) {
            Resolution::Found { file, via } => {
                assert_eq!(via, ResolvedVia::NoteRelative);
                assert_eq!(index.file(file).path, root.join("Notes/a.png"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match resolver.resolve(&reference(note.clone(), "assets/unique.png")) {
            Resolution::Found { via, .. } => assert_eq!(via, ResolvedVia::VaultRelative),
            other => panic!("unexpected {:?}", other),
        }

        match resolver.resolve(&reference(note.clone(), "UNIQUE.png")) {
            Resolution::Found { via, .. } => assert_eq!(via, ResolvedVia::NameSearch),
            other => panic!("unexpected {:?}", other),
        }

        match resolver.resolve(&reference(note, "../a.png")) {
            Resolution::Found { file, via } => {
                assert_eq!(via, ResolvedVia::NoteRelative);
                assert_eq!(index.file(file).path, root.join("a.png"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x/dup.png");
        touch(dir.path(), "y/dup.png");
        touch(dir.path(), "z/n.md");

        let index = VaultIndex::build(dir.path(), &AppConfig::default()).unwrap();
        let note = index.root().join("z/n.md");
        let resolver = ImageResolver::new(&index);

        match resolver.resolve(&reference(note.clone(), "dup.png")) {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(resolver.resolve(&reference(note.clone(), "ghost.png")), Resolution::NotFound);
        assert_eq!(resolver.resolve(&reference(note, "../../outside.png")), Resolution::NotFound);
    }
}
