// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Operation planning
//!
//! Turns naming and deconfliction results into an [`OperationPlan`]: per
//! image, the file move and the exact reference substitutions needed to
//! keep every link valid. The plan carries everything the applier needs,
//! so nothing is re-derived at execution time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::OrganizationConfig;
use crate::model::{ImageId, NamingDecision, SyntaxKind};
use crate::paths::relative_link;
use crate::vault::VaultIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    /// Move into another directory, possibly under a new name
    Move { from: PathBuf, to: PathBuf },
    /// New name in the same directory
    Rename { from: PathBuf, to: PathBuf },
    /// Replace `raw_text` at `span` in `note` with `new_text`
    RewriteReference {
        note: PathBuf,
        span: Range<usize>,
        raw_text: String,
        new_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePlan {
    pub image: ImageId,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub decision: NamingDecision,
    pub actions: Vec<PlannedAction>,
}

impl ImagePlan {
    pub fn rewrites(&self) -> impl Iterator<Item = (&Path, &Range<usize>, &str, &str)> {
        self.actions.iter().filter_map(|action| match action {
            PlannedAction::RewriteReference {
                note,
                span,
                raw_text,
                new_text,
            } => Some((note.as_path(), span, raw_text.as_str(), new_text.as_str())),
            _ => None,
        })
    }

    pub fn moves_file(&self) -> bool {
        self.source != self.destination
    }
}

/// Ordered plan for a whole run, one entry per image, in scan order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationPlan {
    pub entries: Vec<ImagePlan>,
}

impl OperationPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn rewrite_count(&self) -> usize {
        self.entries.iter().map(|e| e.rewrites().count()).sum()
    }

    /// Files the plan will modify or move
    pub fn touched_paths(&self) -> BTreeSet<PathBuf> {
        let mut paths = BTreeSet::new();
        for entry in &self.entries {
            if entry.moves_file() {
                paths.insert(entry.source.clone());
            }
            for (note, ..) in entry.rewrites() {
                paths.insert(note.to_path_buf());
            }
        }
        paths
    }
}

/// Folder an image belongs in: that of its first referencing note
pub fn destination_dir(index: &VaultIndex, image: ImageId) -> Option<PathBuf> {
    let first = index.image(image).referencing.first()?;
    index.reference(*first).source_note.parent().map(Path::to_path_buf)
}

pub struct OperationPlanner<'a> {
    index: &'a VaultIndex,
    update_links: bool,
}

impl<'a> OperationPlanner<'a> {
    pub fn new(index: &'a VaultIndex, config: &OrganizationConfig) -> Self {
        Self {
            index,
            update_links: config.update_links,
        }
    }

    /// Plan one image. Returns `None` when the image stays where it is.
    pub fn plan_image(&self, image: ImageId, decision: NamingDecision, destination: PathBuf) -> Option<ImagePlan> {
        let file = self.index.image(image);
        let source = file.current_path.clone();
        if source == destination {
            return None;
        }

        let mut actions = Vec::new();
        if source.parent() == destination.parent() {
            actions.push(PlannedAction::Rename {
                from: source.clone(),
                to: destination.clone(),
            });
        } else {
            actions.push(PlannedAction::Move {
                from: source.clone(),
                to: destination.clone(),
            });
        }

        if self.update_links {
            for &rid in &file.referencing {
                let reference = self.index.reference(rid);
                let note_dir = reference.source_note.parent().unwrap_or(self.index.root());
                let mut target = relative_link(note_dir, &destination);
                if reference.syntax == SyntaxKind::MarkdownImage
                    && (reference.is_percent_encoded() || breaks_destination(&target, reference.is_angle_bracketed()))
                {
                    target = encode_link(&target);
                }

                let new_text = reference.with_target(&target);
                if new_text == reference.raw_text {
                    continue;
                }
                actions.push(PlannedAction::RewriteReference {
                    note: reference.source_note.clone(),
                    span: reference.span.clone(),
                    raw_text: reference.raw_text.clone(),
                    new_text,
                });
            }
        } else {
            warn!(
                "Link updates disabled: {} reference(s) to {} will break",
                file.referencing.len(),
                self.index.relative(&source)
            );
        }

        info!(
            "Planned {} -> {}",
            self.index.relative(&source),
            self.index.relative(&destination)
        );

        Some(ImagePlan {
            image,
            source,
            destination,
            decision,
            actions,
        })
    }
}

/// Whether `target` cannot be written verbatim as a markdown destination
fn breaks_destination(target: &str, angle_bracketed: bool) -> bool {
    if angle_bracketed {
        target.contains(['<', '>', '\n'])
    } else {
        target.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'))
    }
}

/// Percent-encode each path segment, keeping `/` separators
fn encode_link(link: &str) -> String {
    link.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StrategyKind};
    use crate::scanner::ReferenceScanner;
    use tempfile::TempDir;

    fn named(name: &str) -> NamingDecision {
        NamingDecision::Named {
            chosen_name: name.to_string(),
            strategy: StrategyKind::OriginalFilename,
            rationale: String::new(),
        }
    }

    /// Index a vault and record every reference against its note-relative
    /// or root-level target
    fn indexed(files: &[(&str, &str)], config: &AppConfig) -> (TempDir, VaultIndex) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let mut index = VaultIndex::build(dir.path(), config).unwrap();
        let notes = index.notes().to_vec();
        let scans: Vec<_> = ReferenceScanner::new(&notes, &config.image).collect();
        for scan in scans {
            for reference in scan.references {
                let resolver = crate::resolver::ImageResolver::new(&index);
                if let crate::resolver::Resolution::Found { file, .. } = resolver.resolve(&reference) {
                    index.record(reference, file);
                }
            }
        }
        (dir, index)
    }

    #[test]
    fn test_move_rewrites_relative_target() {
        let config = AppConfig::default();
        let (_dir, index) = indexed(
            &[
                ("assets/chart one.png", "x"),
                ("Notes/a.md", "See ![alt](../assets/chart%20one.png \"t\")"),
            ],
            &config,
        );
        let planner = OperationPlanner::new(&index, &config.organization);
        let dest_dir = destination_dir(&index, 0).unwrap();
        let plan = planner
            .plan_image(0, named("energy chart.png"), dest_dir.join("energy chart.png"))
            .unwrap();

        assert!(matches!(plan.actions[0], PlannedAction::Move { .. }));
        let rewrites: Vec<_> = plan.rewrites().collect();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].3, "![alt](energy%20chart.png \"t\")");
    }

    #[test]
    fn test_unchanged_reference_is_not_rewritten() {
        let config = AppConfig::default();
        let (_dir, index) = indexed(&[("Notes/img.png", "x"), ("Notes/a.md", "![[img.png|300]]")], &config);
        let planner = OperationPlanner::new(&index, &config.organization);

        let dest_dir = destination_dir(&index, 0).unwrap();
        assert!(planner.plan_image(0, named("img.png"), dest_dir.join("img.png")).is_none());

        let plan = planner.plan_image(0, named("graph.png"), dest_dir.join("graph.png")).unwrap();
        assert!(matches!(plan.actions[0], PlannedAction::Rename { .. }));
        assert_eq!(plan.rewrites().next().unwrap().3, "![[graph.png|300]]");
    }

    #[test]
    fn test_link_updates_disabled() {
        let mut config = AppConfig::default();
        config.organization.update_links = false;
        let (_dir, index) = indexed(&[("img.png", "x"), ("Notes/a.md", "![[img.png]]")], &config);
        let planner = OperationPlanner::new(&index, &config.organization);

        let dest = destination_dir(&index, 0).unwrap().join("img.png");
        let plan = planner.plan_image(0, named("img.png"), dest).unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.rewrites().count(), 0);
    }

    #[test]
    fn test_space_in_destination_folder_is_encoded() {
        let config = AppConfig::default();
        let (_dir, index) = indexed(
            &[
                ("shared.png", "x"),
                ("A B/first.md", "![[shared.png]]"),
                ("C/second.md", "![](../shared.png) and ![x](<../shared.png>)"),
            ],
            &config,
        );
        let planner = OperationPlanner::new(&index, &config.organization);
        let dest = destination_dir(&index, 0).unwrap().join("shared.png");
        let plan = planner.plan_image(0, named("shared.png"), dest).unwrap();

        let rewrites: Vec<_> = plan.rewrites().map(|r| r.3.to_string()).collect();
        assert_eq!(rewrites, vec!["![](../A%20B/shared.png)", "![x](<../A B/shared.png>)"]);
    }

    #[test]
    fn test_paren_in_name_is_encoded() {
        let config = AppConfig::default();
        let (_dir, index) = indexed(&[("img.png", "x"), ("Notes/n.md", "![](../img.png)")], &config);
        let planner = OperationPlanner::new(&index, &config.organization);
        let dest = destination_dir(&index, 0).unwrap().join("Step_1)_overview.png");
        let plan = planner.plan_image(0, named("Step_1)_overview.png"), dest).unwrap();

        let new_text = plan.rewrites().next().unwrap().3.to_string();
        assert_eq!(new_text, "![](Step_1%29_overview.png)");
        let rescan = crate::scanner::extract_references(Path::new("n.md"), &new_text, &config.image);
        assert_eq!(rescan.references.len(), 1);
        assert_eq!(rescan.references[0].decoded_target(), "Step_1)_overview.png");
    }

    #[test]
    fn test_touched_paths() {
        let config = AppConfig::default();
        let (_dir, index) = indexed(&[("img.png", "x"), ("Notes/a.md", "![](../img.png)")], &config);
        let planner = OperationPlanner::new(&index, &config.organization);
        let dest = destination_dir(&index, 0).unwrap().join("img.png");
        let plan = OperationPlan {
            entries: vec![planner.plan_image(0, named("img.png"), dest).unwrap()],
        };

        let touched = plan.touched_paths();
        assert_eq!(touched.len(), 2);
        assert_eq!(plan.rewrite_count(), 1);
    }
}
