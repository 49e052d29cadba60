// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Context keyword strategy
//!
//! Local heuristic: the most frequent non-stopword terms around the
//! image's references. No network access, always available.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::{NamingRequest, NamingStrategy, Proposal};
use crate::config::StrategyKind;
use crate::provider::{FailureKind, ProposeError};

static TERM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Han}+|[A-Za-z]+").expect("term regex"));

pub struct ContextKeywordStrategy {
    max_keywords: usize,
}

impl ContextKeywordStrategy {
    pub fn new(max_keywords: usize) -> Self {
        Self {
            max_keywords: max_keywords.max(1),
        }
    }
}

#[async_trait]
impl NamingStrategy for ContextKeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ContextKeywords
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError> {
        let keywords = extract_keywords(&request.context, self.max_keywords);
        if keywords.is_empty() {
            return Err(ProposeError::new(FailureKind::NoCandidate, "no keywords in context"));
        }
        Ok(Proposal {
            name: keywords.join(" "),
            rationale: format!("context keywords: {}", keywords.join(", ")),
        })
    }
}

/// Up to `limit` salient terms, most frequent first, ties in order of
/// first appearance. English terms are lowercased.
pub fn extract_keywords(context: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, m) in TERM_REGEX.find_iter(context).enumerate() {
        let term = m.as_str();
        let term = if term.is_ascii() { term.to_ascii_lowercase() } else { term.to_string() };
        if term.chars().count() < 2 || is_stop_word(&term) {
            continue;
        }
        let entry = counts.entry(term).or_insert((0, position));
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(term, _, _)| term).collect()
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "a" | "an" | "and" | "or" | "but" | "of" | "to" | "in" | "on" | "at" | "for"
            | "with" | "from" | "by" | "as" | "is" | "are" | "was" | "were" | "be" | "been"
            | "this" | "that" | "these" | "those" | "it" | "its" | "we" | "our" | "you" | "your"
            | "can" | "will" | "shows" | "show" | "above" | "below" | "here" | "there" | "see"
            | "image" | "img" | "pasted" | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg"
            | "webp" | "的" | "是" | "在" | "有" | "和" | "与" | "或" | "下面" | "上面" | "这个"
            | "图片"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_frequency_then_first_appearance() {
        let context = "The energy diagram shows energy flow. [image] Energy and flow.";
        assert_eq!(extract_keywords(context, 3), vec!["energy", "flow", "diagram"]);
    }

    #[test]
    fn test_stop_words_and_marker_are_ignored() {
        assert!(extract_keywords("the [image] of a png", 3).is_empty());
    }

    #[test]
    fn test_han_terms() {
        let context = "下面是我们系统的核心类图 [image] 类图展示了系统组件";
        let keywords = extract_keywords(context, 2);
        assert_eq!(keywords.len(), 2);
        assert!(keywords.iter().all(|k| !k.is_ascii()));
    }

    #[tokio::test]
    async fn test_strategy_fails_without_keywords() {
        let strategy = ContextKeywordStrategy::new(3);
        let request = NamingRequest {
            image_path: PathBuf::from("/v/img1.png"),
            extension: "png".to_string(),
            original_stem: "img1".to_string(),
            size: 1,
            context: "[image]".to_string(),
            first_note: PathBuf::from("/v/energy.md"),
        };
        let err = strategy.propose(&request).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::NoCandidate);

        let request = NamingRequest {
            context: "Diagram\n[image]".to_string(),
            ..request
        };
        assert_eq!(strategy.propose(&request).await.unwrap().name, "diagram");
    }
}
