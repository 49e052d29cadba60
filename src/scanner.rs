// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Reference scanner
//!
//! Reads notes one at a time and extracts image references in the two
//! supported syntaxes:
//!
//! - embeds: `![[target]]`, `![[target|alias]]`
//! - markdown images: `![alt](target)`, `![alt](target "title")`,
//!   `![alt](<target with spaces>)`
//!
//! Spans are byte-exact so the applier can replace each occurrence by
//! position. Malformed spans are skipped with a warning, never fatal.
//! References inside fenced code blocks and inline code are ignored.

use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

use crate::config::ImageConfig;
use crate::error::{Issue, IssueKind};
use crate::model::{Reference, SyntaxKind};

static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"!\[\[(?P<wiki>[^\[\]\n]+)\]\]|!\[(?P<alt>[^\[\]\n]*)\]\((?P<dest>[^()\n]*(?:\([^()\n]*\)[^()\n]*)*)\)",
    )
    .expect("reference regex")
});

/// Openers that, when not part of a complete match, mark a malformed span
static OPENER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[|!\[[^\[\]\n]*\]\(").expect("opener regex"));

static INLINE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("inline code regex"));

/// Splits a markdown destination into target and optional title
static DESTINATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<target>.*?)(?:\s+(?:"[^"]*"|'[^']*'))?\s*$"#).expect("destination regex")
});

/// Placeholder marking where the image sits inside its context text
pub const IMAGE_MARKER: &str = "[image]";

/// References and skips found in one note
#[derive(Debug, Clone, Default)]
pub struct NoteScan {
    pub note: PathBuf,
    pub references: Vec<Reference>,
    pub issues: Vec<Issue>,
}

/// Lazy, one-pass scan over a list of notes.
///
/// Each note is read from disk when the iterator reaches it; nothing is
/// cached between runs.
pub struct ReferenceScanner<'a> {
    notes: std::slice::Iter<'a, PathBuf>,
    image: &'a ImageConfig,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(notes: &'a [PathBuf], image: &'a ImageConfig) -> Self {
        Self {
            notes: notes.iter(),
            image,
        }
    }
}

impl Iterator for ReferenceScanner<'_> {
    type Item = NoteScan;

    fn next(&mut self) -> Option<NoteScan> {
        let note = self.notes.next()?;
        match std::fs::read_to_string(note) {
            Ok(content) => Some(extract_references(note, &content, self.image)),
            Err(e) => {
                warn!("Cannot read note {:?}: {}", note, e);
                Some(NoteScan {
                    note: note.clone(),
                    references: Vec::new(),
                    issues: vec![Issue::new(
                        IssueKind::ScanSkip,
                        note,
                        format!("note not readable: {}", e),
                    )],
                })
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.notes.size_hint()
    }
}

/// Extract every image reference from `content`, in document order.
pub fn extract_references(note: &Path, content: &str, image: &ImageConfig) -> NoteScan {
    let mut scan = NoteScan {
        note: note.to_path_buf(),
        ..Default::default()
    };

    let mut offset = 0;
    let mut fence: Option<char> = None;

    for (line_idx, line) in content.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        let trimmed = line.trim_start();
        if let Some(marker) = fence_marker(trimmed) {
            match fence {
                Some(open) if open == marker => fence = None,
                None => fence = Some(marker),
                _ => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        let code_spans: Vec<Range<usize>> = INLINE_CODE_REGEX.find_iter(line).map(|m| m.range()).collect();
        let in_code = |pos: usize| code_spans.iter().any(|r| r.contains(&pos));

        let mut covered: Vec<Range<usize>> = Vec::new();
        for caps in REFERENCE_REGEX.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            covered.push(whole.range());
            if in_code(whole.start()) {
                continue;
            }

            let parsed = if let Some(inner) = caps.name("wiki") {
                parse_wiki(inner.as_str(), inner.start() - whole.start())
            } else if let Some(dest) = caps.name("dest") {
                parse_markdown(dest.as_str(), dest.start() - whole.start())
            } else {
                None
            };

            let Some(target_span) = parsed else {
                continue;
            };
            let raw = whole.as_str();
            let target = &raw[target_span.clone()];
            if !has_image_extension(target, image) {
                continue;
            }

            let syntax = if caps.name("wiki").is_some() {
                SyntaxKind::WikiEmbed
            } else {
                SyntaxKind::MarkdownImage
            };
            let span = (line_start + whole.start())..(line_start + whole.end());
            scan.references.push(Reference {
                source_note: note.to_path_buf(),
                raw_text: raw.to_string(),
                syntax,
                alt_text: caps.name("alt").map(|a| a.as_str().to_string()),
                target_text: target.to_string(),
                context: context_window(content, &span, image.context_chars),
                span,
                target_span,
                line: line_idx + 1,
            });
        }

        for opener in OPENER_REGEX.find_iter(line) {
            let pos = opener.start();
            if in_code(pos) || covered.iter().any(|r| r.contains(&pos)) {
                continue;
            }
            let snippet: String = line[pos..].trim_end().chars().take(60).collect();
            warn!("Skipping malformed reference in {:?} line {}: {}", note, line_idx + 1, snippet);
            scan.issues.push(Issue::new(
                IssueKind::ScanSkip,
                note,
                format!("line {}: malformed reference `{}`", line_idx + 1, snippet),
            ));
        }
    }

    scan
}

fn fence_marker(trimmed_line: &str) -> Option<char> {
    if trimmed_line.starts_with("```") {
        Some('`')
    } else if trimmed_line.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

/// Target span of an embed body, relative to the whole match.
///
/// The alias after `|` (or `\|` inside tables) and any `#` anchor are left
/// out of the target.
fn parse_wiki(inner: &str, inner_offset: usize) -> Option<Range<usize>> {
    let mut end = inner.find(['|', '#']).unwrap_or(inner.len());
    if inner[end..].starts_with('|') && inner[..end].ends_with('\\') {
        end -= 1;
    }
    trimmed_span(inner, 0..end).map(|r| (r.start + inner_offset)..(r.end + inner_offset))
}

/// Target span of a markdown destination, relative to the whole match
fn parse_markdown(dest: &str, dest_offset: usize) -> Option<Range<usize>> {
    let lead = dest.len() - dest.trim_start().len();
    let rest = &dest[lead..];

    let span = if let Some(stripped) = rest.strip_prefix('<') {
        let close = stripped.find('>')?;
        (lead + 1)..(lead + 1 + close)
    } else {
        let caps = DESTINATION_REGEX.captures(rest)?;
        let target = caps.name("target")?;
        trimmed_span(rest, target.range()).map(|r| (r.start + lead)..(r.end + lead))?
    };

    if span.is_empty() {
        return None;
    }
    Some((span.start + dest_offset)..(span.end + dest_offset))
}

fn trimmed_span(s: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &s[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());
    (start < end).then_some(start..end)
}

fn has_image_extension(target: &str, image: &ImageConfig) -> bool {
    let decoded = urlencoding::decode(target)
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| target.to_string());
    Path::new(&decoded)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| image.is_supported(ext))
}

/// Up to `window` characters on each side of `span`, with the reference
/// itself replaced by [`IMAGE_MARKER`] and neighbouring references dropped
fn context_window(content: &str, span: &Range<usize>, window: usize) -> String {
    let before = tail_chars(&content[..span.start], window);
    let after = head_chars(&content[span.end..], window);
    format!(
        "{}{}{}",
        REFERENCE_REGEX.replace_all(before, ""),
        IMAGE_MARKER,
        REFERENCE_REGEX.replace_all(after, "")
    )
    .trim()
    .to_string()
}

fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
