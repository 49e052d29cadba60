// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Reorganization pipeline
//!
//! scan -> resolve -> name -> deconflict -> plan -> simulate or apply.
//! Naming is the only concurrent stage; everything that decides or
//! mutates paths runs sequentially in scan order.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apply::{simulate, Applier};
use crate::backup::BackupManager;
use crate::config::AppConfig;
use crate::conflict::ConflictResolver;
use crate::error::{Issue, IssueKind};
use crate::journal::{JournalEvent, RunJournal};
use crate::model::{ImageId, NamingDecision, Reference};
use crate::naming::{NamingChain, NamingRequest};
use crate::paths::normalize;
use crate::plan::{destination_dir, OperationPlan, OperationPlanner};
use crate::provider::{build_provider, NameProvider};
use crate::resolver::{ImageResolver, Resolution};
use crate::scanner::ReferenceScanner;
use crate::summary::{RunSummary, UnresolvedEntry};
use crate::vault::VaultIndex;
use crate::Result;

/// Everything a run produced
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub plan: OperationPlan,
    /// Human-readable plan, as printed in simulation mode
    #[serde(skip)]
    pub plan_text: String,
}

pub struct Engine {
    config: Arc<AppConfig>,
    provider: Option<Arc<dyn NameProvider>>,
    abort: Option<watch::Receiver<bool>>,
}

impl Engine {
    /// Engine with the provider described by the configuration
    pub fn new(config: Arc<AppConfig>) -> Self {
        let provider = if config.naming.use_ai {
            build_provider(&config.ai)
        } else {
            None
        };
        Self {
            config,
            provider,
            abort: None,
        }
    }

    pub fn with_provider(mut self, provider: Option<Arc<dyn NameProvider>>) -> Self {
        self.provider = provider;
        self
    }

    /// Abort flag; once true, naming is abandoned and no further image is applied
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn is_aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run the pipeline over `vault`.
    ///
    /// Only an inaccessible vault root or a failed backup is an error;
    /// everything else is reported in the summary.
    pub async fn run(&self, vault: &Path, dry_run: bool) -> Result<RunReport> {
        let config = self.config.as_ref();
        let run_id = Uuid::new_v4().to_string();
        let mut index = VaultIndex::build(vault, config)?;
        let root = index.root().to_path_buf();

        let journal = config
            .logging
            .journal
            .as_deref()
            .and_then(|path| open_journal(path, &root, &run_id));
        let log = |event: JournalEvent| {
            if let Some(journal) = &journal {
                if let Err(e) = journal.record(event) {
                    warn!("Failed to write journal {:?}: {}", journal.path(), e);
                }
            }
        };
        info!("Indexed {} note(s) and {} image file(s) in {:?}", index.notes().len(), index.file_count(), root);
        log(JournalEvent::RunStarted { vault: root.clone(), dry_run });

        let mut summary = RunSummary {
            run_id: run_id.clone(),
            vault: root.clone(),
            dry_run,
            notes_scanned: index.notes().len(),
            ..RunSummary::default()
        };

        // Scan and resolve
        let notes = index.notes().to_vec();
        let mut references: Vec<Reference> = Vec::new();
        for scan in ReferenceScanner::new(&notes, &config.image) {
            for issue in scan.issues {
                log(issue_event(&issue));
                summary.issues.push(issue);
            }
            references.extend(scan.references);
        }
        summary.references_found = references.len();

        for reference in references {
            let resolution = ImageResolver::new(&index).resolve(&reference);
            match resolution {
                Resolution::Found { file, via } => {
                    debug!("{} -> {:?} ({:?})", reference.raw_text, index.file(file).path, via);
                    index.record(reference, file);
                }
                unresolved => {
                    warn!(
                        "Unresolved reference {} in {}:{}: {}",
                        reference.raw_text,
                        index.relative(&reference.source_note),
                        reference.line,
                        unresolved
                    );
                    let issue = Issue::new(
                        IssueKind::UnresolvedReference,
                        &reference.source_note,
                        format!("line {}: {}: {}", reference.line, reference.target_text, unresolved),
                    );
                    log(issue_event(&issue));
                    summary.issues.push(issue);
                    summary.unresolved.push(UnresolvedEntry {
                        note: reference.source_note,
                        line: reference.line,
                        target: reference.target_text,
                        reason: unresolved.to_string(),
                    });
                }
            }
        }
        summary.images_found = index.images().len();

        // Pick the images that need to move
        let mut candidates: Vec<(ImageId, PathBuf)> = Vec::new();
        for (id, image) in index.images().iter().enumerate() {
            let Some(dest_dir) = destination_dir(&index, id) else { continue };
            if config.organization.skip_existing && image.current_path.parent() == Some(dest_dir.as_path()) {
                debug!("{} already in place", index.relative(&image.current_path));
                summary.already_in_place += 1;
                summary.in_place.push(image.current_path.clone());
                log(JournalEvent::Skip {
                    path: image.current_path.clone(),
                    reason: "already in its note's folder".to_string(),
                });
                continue;
            }
            candidates.push((id, dest_dir));
        }

        // Name them, concurrently but collected in scan order
        let chain = NamingChain::from_config(config, self.provider.clone());
        let requests: Vec<NamingRequest> = candidates
            .iter()
            .map(|(id, _)| NamingRequest::from_index(&index, *id))
            .collect();
        info!("Naming {} image(s) with {:?}", requests.len(), chain.kinds());

        let naming = stream::iter(requests.iter().map(|request| chain.decide(request)))
            .buffered(config.ai.concurrency.max(1))
            .collect::<Vec<_>>();
        let decisions = match self.abort.clone() {
            Some(mut abort) => tokio::select! {
                biased;

                _ = wait_for_abort(&mut abort) => {
                    warn!("Aborted during naming, nothing was changed");
                    summary.aborted = true;
                    return Ok(RunReport { summary, plan: OperationPlan::default(), plan_text: String::new() });
                }
                decisions = naming => decisions,
            },
            None => naming.await,
        };

        // Deconflict and plan, sequentially in scan order
        let mut conflicts = ConflictResolver::new(config.organization.max_suffix_attempts);
        let planner = OperationPlanner::new(&index, &config.organization);
        let mut plan = OperationPlan::default();

        for ((id, dest_dir), (decision, issues)) in candidates.into_iter().zip(decisions) {
            let image = index.image(id);
            for issue in issues {
                log(issue_event(&issue));
                summary.issues.push(issue);
            }
            log(JournalEvent::Decision {
                image: image.current_path.clone(),
                strategy: decision.strategy(),
                name: match &decision {
                    NamingDecision::Named { chosen_name, .. } => Some(chosen_name.clone()),
                    NamingDecision::KeepOriginal { .. } => None,
                },
                rationale: decision.rationale().to_string(),
            });

            let name = match &decision {
                NamingDecision::Named { chosen_name, .. } => chosen_name.clone(),
                NamingDecision::KeepOriginal { .. } => image.file_name(),
            };
            let destination = match conflicts.claim(&dest_dir, &name, &image.current_path) {
                Ok(destination) => destination,
                Err(issue) => {
                    warn!("{}", issue);
                    log(issue_event(&issue));
                    summary.issues.push(issue);
                    continue;
                }
            };

            let current = image.current_path.clone();
            match planner.plan_image(id, decision, destination) {
                Some(entry) => plan.entries.push(entry),
                None => {
                    summary.already_in_place += 1;
                    summary.in_place.push(current);
                }
            }
        }
        summary.planned = plan.len();

        if dry_run {
            let plan_text = simulate(&plan, &root);
            log(JournalEvent::RunFinished { applied: 0, issues: summary.issues.len() });
            return Ok(RunReport { summary, plan, plan_text });
        }

        if plan.is_empty() {
            info!("Nothing to do");
            log(JournalEvent::RunFinished { applied: 0, issues: summary.issues.len() });
            return Ok(RunReport { summary, plan, plan_text: String::new() });
        }

        if self.is_aborted() {
            warn!("Aborted before execution, nothing was changed");
            summary.aborted = true;
            return Ok(RunReport { summary, plan, plan_text: String::new() });
        }

        // Backup, then apply
        let mut backup = if config.organization.create_backup {
            let backup = BackupManager::new(&config.organization).create(&root, &plan, &run_id)?;
            info!("Backup created at {:?}", backup.dir);
            log(JournalEvent::Backup { dir: Some(backup.dir.clone()), files: backup.manifest.files.len() });
            summary.backup = Some(backup.dir.clone());
            Some(backup)
        } else {
            warn!("{}", "!".repeat(60));
            warn!("BACKUP DISABLED: changes to {:?} cannot be rolled back", root);
            warn!("{}", "!".repeat(60));
            log(JournalEvent::Backup { dir: None, files: 0 });
            None
        };

        let mut applier = Applier::new(&root);
        if let Some(abort) = self.abort.clone() {
            applier = applier.with_abort(abort);
        }
        let outcome = applier.execute(&plan);

        for applied in &outcome.applied {
            log(JournalEvent::Moved {
                from: applied.from.clone(),
                to: applied.to.clone(),
                rewrites: applied.rewrites,
            });
        }
        if let Some(backup) = backup.as_mut() {
            if let Err(e) = backup.record_moves(&outcome.applied) {
                warn!("Failed to record moves in backup manifest: {}", e);
            }
        }
        for issue in outcome.failures {
            log(issue_event(&issue));
            summary.issues.push(issue);
        }
        summary.applied = outcome.applied.len();
        summary.aborted = !outcome.skipped.is_empty();

        log(JournalEvent::RunFinished {
            applied: summary.applied,
            issues: summary.issues.len(),
        });
        Ok(RunReport { summary, plan, plan_text: String::new() })
    }
}

fn issue_event(issue: &Issue) -> JournalEvent {
    JournalEvent::Issue {
        kind: issue.kind,
        path: issue.path.clone(),
        detail: issue.detail.clone(),
    }
}

/// Resolve once the flag is set; never if the sender goes away first
/// Journal at `path`, unless it would land inside the vault being processed
fn open_journal(path: &Path, root: &Path, run_id: &str) -> Option<RunJournal> {
    let absolute = match std::env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(path)),
        Err(_) => path.to_path_buf(),
    };
    let canonical = absolute
        .parent()
        .and_then(|dir| dir.canonicalize().ok())
        .zip(absolute.file_name())
        .map(|(dir, name)| dir.join(name));
    let resolved = canonical.unwrap_or(absolute);
    if resolved.starts_with(root) {
        warn!("Journal {:?} is inside the vault, not writing it", resolved);
        return None;
    }
    Some(RunJournal::new(resolved, run_id))
}

async fn wait_for_abort(abort: &mut watch::Receiver<bool>) {
    loop {
        if *abort.borrow_and_update() {
            return;
        }
        if abort.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
