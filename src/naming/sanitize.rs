// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Name cleaning and sanitization

use regex::Regex;
use std::sync::LazyLock;

use crate::config::NamingConfig;

/// Characters no filename may contain on any supported platform
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Characters that break embeds and links inside notes
const LINK_BREAKING: &[char] = &['#', '^', '[', ']', '(', ')', '|', '%', '`', '{', '}'];

static EXTENSION_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\.|\b)(?:png|jpe?g|gif|bmp|svg|webp)\b").expect("extension word regex")
});

static PASTED_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pasted[ _-]?image").expect("pasted image regex"));

/// Rules applied to every winning raw name
#[derive(Debug, Clone)]
pub struct SanitizeRules {
    pub max_length: usize,
    pub remove_special_chars: bool,
    pub replace_spaces: String,
}

impl From<&NamingConfig> for SanitizeRules {
    fn from(config: &NamingConfig) -> Self {
        Self {
            max_length: config.max_length,
            remove_special_chars: config.remove_special_chars,
            replace_spaces: config.replace_spaces.clone(),
        }
    }
}

impl Default for SanitizeRules {
    fn default() -> Self {
        Self::from(&NamingConfig::default())
    }
}

/// Strip chat noise from a model response, keeping the proposed name.
pub fn clean_response(raw: &str) -> String {
    let mut clean = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();

    // Remove common chat prefixes ("Filename: ...")
    if let Some(idx) = clean.find([':', '：']) {
        if idx < 30 && idx + 1 < clean.len() {
            let sep_len = clean[idx..].chars().next().map(char::len_utf8).unwrap_or(1);
            clean = clean[idx + sep_len..].trim().to_string();
        }
    }

    clean = clean
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '“' | '”' | '「' | '」'))
        .to_string();
    clean = PASTED_IMAGE_REGEX.replace_all(&clean, " ").into_owned();
    clean = EXTENSION_WORD_REGEX.replace_all(&clean, " ").into_owned();
    clean.trim().to_string()
}

/// Turn a raw name into a filename stem, or `None` if nothing usable is left.
///
/// Strips illegal characters, collapses whitespace into the configured
/// substitute and truncates to the configured length in characters.
pub fn sanitize_name(raw: &str, rules: &SanitizeRules) -> Option<String> {
    let filtered: String = raw
        .chars()
        .filter(|c| !c.is_control() && !ILLEGAL.contains(c))
        .filter(|c| !rules.remove_special_chars || !LINK_BREAKING.contains(c))
        .collect();

    let sub = rules.replace_spaces.as_str();
    let mut collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(sub);

    if !sub.is_empty() {
        let doubled = sub.repeat(2);
        while collapsed.contains(&doubled) {
            collapsed = collapsed.replace(&doubled, sub);
        }
    }

    let is_edge = |c: char| c == '.' || c == '-' || c == '_' || c.is_whitespace() || sub.contains(c);
    let trimmed = collapsed.trim_matches(is_edge);

    let truncated: String = trimmed.chars().take(rules.max_length).collect();
    let result = truncated.trim_matches(is_edge).to_string();

    (!result.is_empty()).then_some(result)
}

/// Join a sanitized stem with the original extension
pub fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response_strips_chat_noise() {
        assert_eq!(clean_response("Filename: \"energy_diagram.png\"\nBecause..."), "energy_diagram");
        assert_eq!(clean_response("\n\n  `Hotel booking flow`  "), "Hotel booking flow");
        assert_eq!(clean_response("Pasted image of a class diagram"), "of a class diagram");
        assert_eq!(clean_response("文件名：酒店预约系统流程图"), "酒店预约系统流程图");
    }

    #[test]
    fn test_sanitize_replaces_whitespace_and_illegal_chars() {
        let rules = SanitizeRules::default();
        assert_eq!(sanitize_name("Energy  flow: a/b?", &rules).as_deref(), Some("Energy_flow_ab"));
        assert_eq!(sanitize_name("  #tag [x] ", &rules).as_deref(), Some("tag_x"));
        assert_eq!(sanitize_name("???", &rules), None);
        assert_eq!(sanitize_name("Step 1) overview", &rules).as_deref(), Some("Step_1_overview"));
    }

    #[test]
    fn test_sanitize_truncates_by_characters() {
        let rules = SanitizeRules {
            max_length: 4,
            ..SanitizeRules::default()
        };
        assert_eq!(sanitize_name("隔离级别与异常的关系", &rules).as_deref(), Some("隔离级别"));
        assert_eq!(sanitize_name("abc def", &rules).as_deref(), Some("abc"));
    }

    #[test]
    fn test_custom_substitute() {
        let rules = SanitizeRules {
            replace_spaces: "-".to_string(),
            ..SanitizeRules::default()
        };
        assert_eq!(sanitize_name("state  machine - v2", &rules).as_deref(), Some("state-machine-v2"));
    }

    #[test]
    fn test_special_chars_kept_when_disabled() {
        let rules = SanitizeRules {
            remove_special_chars: false,
            ..SanitizeRules::default()
        };
        assert_eq!(sanitize_name("C# notes", &rules).as_deref(), Some("C#_notes"));
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("diagram", "png"), "diagram.png");
        assert_eq!(with_extension("diagram", ""), "diagram");
    }
}
