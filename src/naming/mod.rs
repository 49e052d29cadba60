// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Naming strategies
//!
//! Every strategy answers the same question: given an image and the text
//! around its references, what should it be called? The [`NamingChain`]
//! tries them in configured order until one produces a usable name.

pub mod ai;
pub mod chain;
pub mod fallback;
pub mod keywords;
pub mod sanitize;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::StrategyKind;
use crate::model::ImageId;
use crate::provider::ProposeError;
use crate::vault::VaultIndex;

pub use chain::NamingChain;

/// Everything a strategy may look at for one image
#[derive(Debug, Clone)]
pub struct NamingRequest {
    pub image_path: PathBuf,
    /// Extension as found on disk, without the dot
    pub extension: String,
    pub original_stem: String,
    pub size: u64,
    /// Context windows of all references, in scan order
    pub context: String,
    /// First referencing note, by scan order
    pub first_note: PathBuf,
}

impl NamingRequest {
    pub fn from_index(index: &VaultIndex, image: ImageId) -> Self {
        let file = index.image(image);
        let mut context = String::new();
        let mut first_note = None;
        for &rid in &file.referencing {
            let reference = index.reference(rid);
            first_note.get_or_insert_with(|| reference.source_note.clone());
            if reference.context.is_empty() || context.contains(&reference.context) {
                continue;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&reference.context);
        }

        Self {
            image_path: file.current_path.clone(),
            extension: file.extension.clone(),
            original_stem: file.stem(),
            size: file.size,
            context,
            first_note: first_note.unwrap_or_default(),
        }
    }

    /// Context with the image marker removed, for "is there anything to
    /// talk about" checks
    pub fn has_context_text(&self) -> bool {
        self.context
            .replace(crate::scanner::IMAGE_MARKER, "")
            .chars()
            .any(|c| c.is_alphanumeric())
    }
}

/// A raw, not yet sanitized name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub name: String,
    pub rationale: String,
}

/// Capability: propose a name for one image
#[async_trait]
pub trait NamingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy can be tried for `request` at all
    fn is_applicable(&self, _request: &NamingRequest) -> bool {
        true
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError>;
}
