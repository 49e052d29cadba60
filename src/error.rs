// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Vaultkeeper
//!
//! [`VaultkeeperError`] is reserved for failures that abort a whole run.
//! Everything that only affects one reference or one image is an [`Issue`]
//! and ends up in the run summary instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Vaultkeeper operations
pub type Result<T> = std::result::Result<T, VaultkeeperError>;

/// Vaultkeeper error types
#[derive(Error, Debug)]
pub enum VaultkeeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vault root not accessible: {0}")]
    VaultRoot(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Kinds of per-reference or per-image problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A malformed reference span was skipped by the scanner
    ScanSkip,
    /// A reference target was not found, or matched several files
    UnresolvedReference,
    /// A naming strategy failed and the chain moved on
    NamingFallthrough,
    /// Every naming strategy failed; the original name is kept
    NamingExhausted,
    /// No free name was found within the suffix budget
    ConflictUnresolvable,
    /// Applying an image's action failed and was rolled back
    ApplyFailure,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::ScanSkip => "scan-skip",
            IssueKind::UnresolvedReference => "unresolved",
            IssueKind::NamingFallthrough => "naming-fallthrough",
            IssueKind::NamingExhausted => "naming-exhausted",
            IssueKind::ConflictUnresolvable => "conflict",
            IssueKind::ApplyFailure => "apply-failure",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A non-fatal problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Note or image the issue concerns
    pub path: PathBuf,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path.display(), self.detail)
    }
}
