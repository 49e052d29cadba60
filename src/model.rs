// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shared data model: references, images and naming decisions

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

use crate::config::StrategyKind;

/// Index of a [`Reference`] inside its `VaultIndex`
pub type ReferenceId = usize;

/// Index of an [`ImageFile`] inside its `VaultIndex`
pub type ImageId = usize;

/// The two supported image reference syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxKind {
    /// `![[target]]` or `![[target|alias]]`
    WikiEmbed,
    /// `![alt](target)` or `![alt](target "title")`
    MarkdownImage,
}

/// One occurrence of an image mention inside a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Note containing the reference
    pub source_note: PathBuf,
    /// Exact matched text
    pub raw_text: String,
    pub syntax: SyntaxKind,
    /// Alt text, markdown images only
    pub alt_text: Option<String>,
    /// Embedded path or name, before resolution
    pub target_text: String,
    /// Byte span of `raw_text` in the note
    pub span: Range<usize>,
    /// Byte span of the target inside `raw_text`
    pub target_span: Range<usize>,
    /// Line number, 1-indexed
    pub line: usize,
    /// Note text around the reference, bounded by the context window
    pub context: String,
}

impl Reference {
    /// Target as written in the note, with percent-encoding undone
    pub fn decoded_target(&self) -> String {
        let target = self.target_text.trim();
        match self.syntax {
            SyntaxKind::MarkdownImage if target.contains('%') => urlencoding::decode(target)
                .map(|t| t.into_owned())
                .unwrap_or_else(|_| target.to_string()),
            _ => target.to_string(),
        }
    }

    /// Whether the target was written percent-encoded
    pub fn is_percent_encoded(&self) -> bool {
        self.syntax == SyntaxKind::MarkdownImage && self.target_text.contains("%20")
    }

    /// Whether a markdown destination is wrapped in `<...>`
    pub fn is_angle_bracketed(&self) -> bool {
        self.syntax == SyntaxKind::MarkdownImage && self.raw_text[..self.target_span.start].ends_with('<')
    }

    /// Raw text with the target portion replaced; syntax, alt text, alias
    /// and title stay as written
    pub fn with_target(&self, new_target: &str) -> String {
        let mut out = String::with_capacity(self.raw_text.len() + new_target.len());
        out.push_str(&self.raw_text[..self.target_span.start]);
        out.push_str(new_target);
        out.push_str(&self.raw_text[self.target_span.end..]);
        out
    }
}

/// A physical image file referenced by at least one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub current_path: PathBuf,
    pub size: u64,
    /// Extension as found on disk, without the dot
    pub extension: String,
    /// References pointing at this image, in scan order
    pub referencing: Vec<ReferenceId>,
}

impl ImageFile {
    /// File name without extension
    pub fn stem(&self) -> String {
        self.current_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.current_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Result of running the naming chain for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NamingDecision {
    Named {
        /// Sanitized name including the original extension
        chosen_name: String,
        strategy: StrategyKind,
        rationale: String,
    },
    /// Every strategy failed; the original file name is kept
    KeepOriginal { reason: String },
}

impl NamingDecision {
    pub fn strategy(&self) -> Option<StrategyKind> {
        match self {
            NamingDecision::Named { strategy, .. } => Some(*strategy),
            NamingDecision::KeepOriginal { .. } => None,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            NamingDecision::Named { rationale, .. } => rationale,
            NamingDecision::KeepOriginal { reason } => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown_ref(raw: &str, target: Range<usize>) -> Reference {
        Reference {
            source_note: PathBuf::from("note.md"),
            raw_text: raw.to_string(),
            syntax: SyntaxKind::MarkdownImage,
            alt_text: Some("alt".to_string()),
            target_text: raw[target.clone()].to_string(),
            span: 0..raw.len(),
            target_span: target,
            line: 1,
            context: String::new(),
        }
    }

    #[test]
    fn test_with_target_keeps_title() {
        let raw = r#"![alt](old.png "A title")"#;
        let reference = markdown_ref(raw, 7..14);
        assert_eq!(reference.target_text, "old.png");
        assert_eq!(reference.with_target("new dir/new.png"), r#"![alt](new dir/new.png "A title")"#);
    }

    #[test]
    fn test_decoded_target() {
        let raw = "![](Pasted%20image.png)";
        let reference = markdown_ref(raw, 4..22);
        assert_eq!(reference.decoded_target(), "Pasted image.png");
        assert!(reference.is_percent_encoded());
    }
}
