// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Fallback strategies that need neither network nor context

use async_trait::async_trait;
use chrono::Utc;

use super::sanitize::{sanitize_name, SanitizeRules};
use super::{NamingRequest, NamingStrategy, Proposal};
use crate::config::StrategyKind;
use crate::provider::{FailureKind, ProposeError};

/// Reuses the image's existing base name. Never fails.
pub struct OriginalFilenameStrategy {
    rules: SanitizeRules,
}

impl OriginalFilenameStrategy {
    pub fn new(rules: SanitizeRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl NamingStrategy for OriginalFilenameStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OriginalFilename
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError> {
        let name = sanitize_name(&request.original_stem, &self.rules).unwrap_or_else(|| "image".to_string());
        Ok(Proposal {
            name,
            rationale: format!("kept original name '{}'", request.original_stem),
        })
    }
}

/// `<note stem>_image`, after the first referencing note
pub struct NoteNameStrategy;

#[async_trait]
impl NamingStrategy for NoteNameStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NoteName
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError> {
        let stem = request
            .first_note
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProposeError::new(FailureKind::NoCandidate, "note has no name"))?;
        Ok(Proposal {
            name: format!("{}_image", stem),
            rationale: format!("named after note '{}'", stem),
        })
    }
}

/// `image_<unix seconds>`
pub struct TimestampStrategy;

#[async_trait]
impl NamingStrategy for TimestampStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Timestamp
    }

    async fn propose(&self, _request: &NamingRequest) -> Result<Proposal, ProposeError> {
        Ok(Proposal {
            name: format!("image_{}", Utc::now().timestamp()),
            rationale: "timestamp".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(stem: &str) -> NamingRequest {
        NamingRequest {
            image_path: PathBuf::from(format!("/v/{}.png", stem)),
            extension: "png".to_string(),
            original_stem: stem.to_string(),
            size: 1,
            context: String::new(),
            first_note: PathBuf::from("/v/Notes/energy.md"),
        }
    }

    #[tokio::test]
    async fn test_original_filename_never_fails() {
        let strategy = OriginalFilenameStrategy::new(SanitizeRules::default());
        assert_eq!(strategy.propose(&request("Pasted image 2025")).await.unwrap().name, "Pasted_image_2025");
        assert_eq!(strategy.propose(&request("???")).await.unwrap().name, "image");
    }

    #[tokio::test]
    async fn test_note_name() {
        let proposal = NoteNameStrategy.propose(&request("x")).await.unwrap();
        assert_eq!(proposal.name, "energy_image");
    }

    #[tokio::test]
    async fn test_timestamp_prefix() {
        let proposal = TimestampStrategy.propose(&request("x")).await.unwrap();
        assert!(proposal.name.starts_with("image_"));
    }
}
