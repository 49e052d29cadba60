// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Lexical path helpers shared by the resolver and the planner

use std::path::{Component, Path, PathBuf};

/// Normalize `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `target` relative to `from_dir`, joined with `/` for use in links.
///
/// Both paths must be absolute and normalized.
pub fn relative_link(from_dir: &Path, target: &Path) -> String {
    let from: Vec<_> = from_dir.components().collect();
    let to: Vec<_> = target.components().collect();

    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// `path` relative to the vault root for display, falling back to the full path
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_parent_components() {
        assert_eq!(
            normalize(Path::new("/vault/Notes/../assets/./a.png")),
            PathBuf::from("/vault/assets/a.png")
        );
    }

    #[test]
    fn test_relative_link_same_dir() {
        assert_eq!(
            relative_link(Path::new("/vault/Notes/Physics"), Path::new("/vault/Notes/Physics/img1.png")),
            "img1.png"
        );
    }

    #[test]
    fn test_relative_link_sibling_dir() {
        assert_eq!(
            relative_link(Path::new("/vault/Notes/Chemistry"), Path::new("/vault/Notes/Physics/img 1.png")),
            "../Physics/img 1.png"
        );
    }

    #[test]
    fn test_relative_link_from_root() {
        assert_eq!(
            relative_link(Path::new("/vault"), Path::new("/vault/Notes/a.png")),
            "Notes/a.png"
        );
    }
}
