// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-of-run summary

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Issue, IssueKind};
use crate::paths::display_relative;

/// A reference that could not be tied to a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub note: PathBuf,
    pub line: usize,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub vault: PathBuf,
    pub dry_run: bool,
    pub notes_scanned: usize,
    pub references_found: usize,
    pub images_found: usize,
    /// Images left alone because they already sit in their folder
    pub already_in_place: usize,
    pub in_place: Vec<PathBuf>,
    pub planned: usize,
    pub applied: usize,
    pub unresolved: Vec<UnresolvedEntry>,
    pub issues: Vec<Issue>,
    pub backup: Option<PathBuf>,
    pub aborted: bool,
}

impl RunSummary {
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn failed(&self) -> usize {
        self.count(IssueKind::ApplyFailure) + self.count(IssueKind::ConflictUnresolvable)
    }

    pub fn render_text(&self) -> String {
        let rel = |p: &Path| display_relative(&self.vault, p);
        let mut out = String::new();

        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "{}Run summary ({})", if self.dry_run { "[DRY RUN] " } else { "" }, self.run_id);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Notes scanned:        {}", self.notes_scanned);
        let _ = writeln!(out, "Image references:     {}", self.references_found);
        let _ = writeln!(out, "Images found:         {}", self.images_found);
        let _ = writeln!(out, "Already in place:     {}", self.already_in_place);
        let _ = writeln!(out, "Planned:              {}", self.planned);
        if !self.dry_run {
            let _ = writeln!(out, "Applied:              {}", self.applied);
            let _ = writeln!(out, "Failed:               {}", self.failed());
        }
        let _ = writeln!(out, "Unresolved:           {}", self.unresolved.len());

        if !self.unresolved.is_empty() {
            let _ = writeln!(out, "\nUnresolved references:");
            for entry in &self.unresolved {
                let _ = writeln!(out, "  {}:{}  {}  ({})", rel(&entry.note), entry.line, entry.target, entry.reason);
            }
        }

        if !self.in_place.is_empty() {
            let _ = writeln!(out, "\nSkipped, already in place:");
            for path in &self.in_place {
                let _ = writeln!(out, "  {}", rel(path));
            }
        }

        let mut by_kind: BTreeMap<&'static str, Vec<&Issue>> = BTreeMap::new();
        for issue in self.issues.iter().filter(|i| i.kind != IssueKind::UnresolvedReference) {
            by_kind.entry(issue.kind.label()).or_default().push(issue);
        }
        for (label, issues) in by_kind {
            let _ = writeln!(out, "\n{} ({}):", label, issues.len());
            for issue in issues {
                let _ = writeln!(out, "  {}: {}", rel(&issue.path), issue.detail);
            }
        }

        if self.aborted {
            let _ = writeln!(out, "\nRun aborted before all images were processed.");
        }
        match &self.backup {
            Some(dir) => {
                let _ = writeln!(out, "\nBackup: {}", dir.display());
            }
            None if !self.dry_run && self.applied > 0 => {
                let _ = writeln!(out, "\nNo backup was made.");
            }
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_unresolved_and_backup() {
        let summary = RunSummary {
            run_id: "r1".to_string(),
            vault: PathBuf::from("/vault"),
            notes_scanned: 2,
            references_found: 3,
            unresolved: vec![UnresolvedEntry {
                note: PathBuf::from("/vault/a.md"),
                line: 4,
                target: "missing.png".to_string(),
                reason: "no matching image in the vault".to_string(),
            }],
            issues: vec![Issue::new(IssueKind::NamingFallthrough, "/vault/x.png", "ai_text: Auth: bad key")],
            already_in_place: 1,
            in_place: vec![PathBuf::from("/vault/Notes/pic.png")],
            backup: Some(PathBuf::from("/vault_backup_20250101_000000")),
            ..RunSummary::default()
        };

        let text = summary.render_text();
        assert!(text.contains("a.md:4  missing.png"));
        assert!(text.contains("naming-fallthrough (1):"));
        assert!(text.contains("Skipped, already in place:\n  Notes/pic.png"));
        assert!(text.contains("Backup: /vault_backup_20250101_000000"));
        assert_eq!(summary.failed(), 0);
    }
}
