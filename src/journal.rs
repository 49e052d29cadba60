// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Run journal: a JSON Lines log of every decision, skip and failure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::StrategyKind;
use crate::error::IssueKind;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    RunStarted {
        vault: PathBuf,
        dry_run: bool,
    },
    Decision {
        image: PathBuf,
        /// `None` when the original name was kept
        strategy: Option<StrategyKind>,
        name: Option<String>,
        rationale: String,
    },
    Skip {
        path: PathBuf,
        reason: String,
    },
    Issue {
        kind: IssueKind,
        path: PathBuf,
        detail: String,
    },
    Moved {
        from: PathBuf,
        to: PathBuf,
        rewrites: usize,
    },
    Backup {
        dir: Option<PathBuf>,
        files: usize,
    },
    RunFinished {
        applied: usize,
        issues: usize,
    },
}

/// A single journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    #[serde(flatten)]
    pub event: JournalEvent,
}

/// Append-only journal file, shared by all runs
pub struct RunJournal {
    path: PathBuf,
    run_id: String,
}

impl RunJournal {
    pub fn new(path: PathBuf, run_id: impl Into<String>) -> Self {
        Self {
            path,
            run_id: run_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the journal
    pub fn record(&self, event: JournalEvent) -> Result<()> {
        let entry = JournalEntry {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            event,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(&entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = RunJournal::new(path.clone(), "run-a");

        journal
            .record(JournalEvent::Decision {
                image: PathBuf::from("img.png"),
                strategy: Some(StrategyKind::ContextKeywords),
                name: Some("diagram.png".to_string()),
                rationale: "context keywords: diagram".to_string(),
            })
            .unwrap();
        RunJournal::new(path.clone(), "run-b")
            .record(JournalEvent::RunFinished { applied: 1, issues: 0 })
            .unwrap();

        let entries: Vec<JournalEntry> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].run_id, "run-a");
        assert_eq!(entries[1].event, JournalEvent::RunFinished { applied: 1, issues: 0 });

        let line = std::fs::read_to_string(&path).unwrap();
        assert!(line.contains(r#""event":"decision""#));
        assert!(line.contains(r#""strategy":"context_keywords""#));
    }
}
