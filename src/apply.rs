// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Plan execution and simulation
//!
//! Images are applied one at a time. Each image's move and note rewrites
//! either all land or are rolled back, and a failed image never stops the
//! rest of the run.
//!
//! Note rewrites replace the exact byte span recorded at scan time. Spans
//! are translated through the edits earlier images made to the same note,
//! and the original text is verified at the translated position before
//! anything is replaced.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{Issue, IssueKind};
use crate::paths::display_relative;
use crate::plan::{ImagePlan, OperationPlan};

/// An image whose action was applied
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AppliedImage {
    pub from: PathBuf,
    pub to: PathBuf,
    pub rewrites: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub applied: Vec<AppliedImage>,
    pub failures: Vec<Issue>,
    /// Images not attempted because the run was aborted
    pub skipped: Vec<PathBuf>,
}

/// Render the plan as a human-readable report. Touches nothing.
pub fn simulate(plan: &OperationPlan, root: &Path) -> String {
    let rel = |p: &Path| display_relative(root, p);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Plan: {} image(s), {} reference rewrite(s)",
        plan.len(),
        plan.rewrite_count()
    );

    for (i, entry) in plan.entries.iter().enumerate() {
        let _ = writeln!(out);
        let how = match entry.decision.strategy() {
            Some(strategy) => format!("{}: {}", strategy, entry.decision.rationale()),
            None => entry.decision.rationale().to_string(),
        };
        let _ = writeln!(out, "[{}] {} -> {}  ({})", i + 1, rel(&entry.source), rel(&entry.destination), how);
        for (note, _, old, new) in entry.rewrites() {
            let _ = writeln!(out, "    {}: {}  =>  {}", rel(note), old, new);
        }
    }
    out
}

/// Executes plans against the filesystem
pub struct Applier {
    root: PathBuf,
    abort: Option<watch::Receiver<bool>>,
    /// Per note: (original offset, length delta) of every edit applied so far
    edits: HashMap<PathBuf, Vec<(usize, isize)>>,
}

impl Applier {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            abort: None,
            edits: HashMap::new(),
        }
    }

    /// Stop before the next image once the flag turns true
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Apply every entry in order. Per-image failures are rolled back and
    /// reported in the outcome.
    pub fn execute(&mut self, plan: &OperationPlan) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for entry in &plan.entries {
            if self.aborted() {
                outcome.skipped.push(entry.source.clone());
                continue;
            }

            match self.apply_image(entry) {
                Ok(applied) => {
                    info!(
                        "Moved {} -> {} ({} reference(s) updated)",
                        display_relative(&self.root, &applied.from),
                        display_relative(&self.root, &applied.to),
                        applied.rewrites
                    );
                    outcome.applied.push(applied);
                }
                Err(detail) => {
                    error!("Failed to apply {:?}: {}", entry.source, detail);
                    outcome
                        .failures
                        .push(Issue::new(IssueKind::ApplyFailure, &entry.source, detail));
                }
            }
        }

        if !outcome.skipped.is_empty() {
            warn!("Run aborted, {} image(s) left untouched", outcome.skipped.len());
        }
        outcome
    }

    fn apply_image(&mut self, entry: &ImagePlan) -> Result<AppliedImage, String> {
        let mut undo = Undo::default();

        match self.try_apply(entry, &mut undo) {
            Ok(applied) => Ok(applied),
            Err(detail) => {
                let rollback = undo.rollback(entry);
                if let Err(e) = rollback {
                    error!("Rollback of {:?} incomplete: {}", entry.source, e);
                    return Err(format!("{}; rollback incomplete: {}", detail, e));
                }
                Err(format!("{} (rolled back)", detail))
            }
        }
    }

    fn try_apply(&mut self, entry: &ImagePlan, undo: &mut Undo) -> Result<AppliedImage, String> {
        // Group rewrites by note and validate them before touching anything
        let mut by_note: Vec<(PathBuf, Vec<Rewrite>)> = Vec::new();
        for (note, span, raw, new) in entry.rewrites() {
            let rewrite = Rewrite {
                span: span.clone(),
                raw: raw.to_string(),
                new: new.to_string(),
            };
            match by_note.iter_mut().find(|(n, _)| n == note) {
                Some((_, list)) => list.push(rewrite),
                None => by_note.push((note.to_path_buf(), vec![rewrite])),
            }
        }

        let mut new_contents = Vec::with_capacity(by_note.len());
        for (note, rewrites) in &by_note {
            let content = std::fs::read_to_string(note).map_err(|e| format!("reading {:?}: {}", note, e))?;
            let updated = self.rewrite_note(note, &content, rewrites)?;
            new_contents.push((note.clone(), content, updated));
        }

        if entry.moves_file() {
            if entry.destination.exists() && !same_path_ignoring_case(&entry.source, &entry.destination) {
                return Err(format!("destination {:?} already exists", entry.destination));
            }
            if let Some(parent) = entry.destination.parent() {
                undo.created_dirs = create_dirs(parent).map_err(|e| format!("creating {:?}: {}", parent, e))?;
            }
            move_file(&entry.source, &entry.destination)
                .map_err(|e| format!("moving to {:?}: {}", entry.destination, e))?;
            undo.moved = true;
        }

        let mut rewrites = 0;
        for (note, original, updated) in new_contents {
            std::fs::write(&note, &updated).map_err(|e| format!("writing {:?}: {}", note, e))?;
            undo.notes.push((note, original));
        }

        // Committed: remember the offset shifts for later images
        for (note, list) in by_note {
            rewrites += list.len();
            let shifts = self.edits.entry(note).or_default();
            for rewrite in list {
                shifts.push((rewrite.span.start, rewrite.new.len() as isize - rewrite.raw.len() as isize));
            }
        }

        Ok(AppliedImage {
            from: entry.source.clone(),
            to: entry.destination.clone(),
            rewrites,
        })
    }

    /// Apply `rewrites` to `content`, back to front, after verifying each
    /// original text at its translated position
    fn rewrite_note(&self, note: &Path, content: &str, rewrites: &[Rewrite]) -> Result<String, String> {
        let shifts = self.edits.get(note).map(Vec::as_slice).unwrap_or(&[]);

        let mut located: Vec<(Range<usize>, &str)> = Vec::with_capacity(rewrites.len());
        for rewrite in rewrites {
            let start = translate(rewrite.span.start, shifts)
                .ok_or_else(|| format!("reference offset in {:?} out of range", note))?;
            let range = start..start + rewrite.raw.len();
            if content.get(range.clone()) != Some(rewrite.raw.as_str()) {
                return Err(format!(
                    "{:?} changed since scan: '{}' not found at byte {}",
                    note, rewrite.raw, start
                ));
            }
            located.push((range, rewrite.new.as_str()));
        }

        located.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut result = content.to_string();
        for (range, new) in located {
            result.replace_range(range, new);
        }
        Ok(result)
    }
}

#[derive(Debug)]
struct Rewrite {
    span: Range<usize>,
    raw: String,
    new: String,
}

/// What has to be undone if an image fails half way
#[derive(Default)]
struct Undo {
    moved: bool,
    created_dirs: Vec<PathBuf>,
    notes: Vec<(PathBuf, String)>,
}

impl Undo {
    fn rollback(self, entry: &ImagePlan) -> std::io::Result<()> {
        for (note, original) in self.notes.iter().rev() {
            std::fs::write(note, original)?;
        }
        if self.moved {
            move_file(&entry.destination, &entry.source)?;
        }
        for dir in self.created_dirs.iter().rev() {
            let _ = std::fs::remove_dir(dir);
        }
        Ok(())
    }
}

fn translate(original: usize, shifts: &[(usize, isize)]) -> Option<usize> {
    let delta: isize = shifts
        .iter()
        .filter(|(at, _)| *at < original)
        .map(|(_, d)| *d)
        .sum();
    original.checked_add_signed(delta)
}

/// Create `dir` and any missing ancestors, returning the ones created,
/// outermost first
fn create_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.exists() {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }
    missing.reverse();
    for path in &missing {
        std::fs::create_dir(path)?;
    }
    Ok(missing)
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            warn!("rename {:?} failed ({}), copying instead", from, rename_err);
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn same_path_ignoring_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
