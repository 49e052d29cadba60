// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Vaultkeeper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// AI provider configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Image handling
    #[serde(default)]
    pub image: ImageConfig,

    /// Naming rules
    #[serde(default)]
    pub naming: NamingConfig,

    /// Move, backup and link behaviour
    #[serde(default)]
    pub organization: OrganizationConfig,

    /// Which files belong to the vault
    #[serde(default)]
    pub vault: VaultConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Ecnu,
    Ollama,
    None,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ecnu" => Ok(ProviderKind::Ecnu),
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            "none" => Ok(ProviderKind::None),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    /// File whose trimmed contents are the API key
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub models: ModelConfig,
    /// Explicit override of the vision capability of the configured model
    #[serde(default)]
    pub vision: Option<bool>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ModelConfig {
    #[serde(default)]
    pub vision: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_formats")]
    pub supported_formats: Vec<String>,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    /// Characters of note text taken before and after each reference
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

/// One link of the naming chain.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AiVision,
    AiText,
    ContextKeywords,
    NoteName,
    Timestamp,
    OriginalFilename,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::AiVision => "ai_vision",
            StrategyKind::AiText => "ai_text",
            StrategyKind::ContextKeywords => "context_keywords",
            StrategyKind::NoteName => "note_name",
            StrategyKind::Timestamp => "timestamp",
            StrategyKind::OriginalFilename => "original_filename",
        }
    }

    pub fn uses_ai(&self) -> bool {
        matches!(self, StrategyKind::AiVision | StrategyKind::AiText)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NamingConfig {
    #[serde(default = "default_true")]
    pub use_ai: bool,
    #[serde(default = "default_chain")]
    pub chain: Vec<StrategyKind>,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub remove_special_chars: bool,
    #[serde(default = "default_replace_spaces")]
    pub replace_spaces: String,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupScope {
    /// Copy the whole vault
    Full,
    /// Copy only the images and notes the plan touches
    Touched,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrganizationConfig {
    #[serde(default = "default_true")]
    pub create_backup: bool,
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
    #[serde(default = "default_backup_scope")]
    pub backup_scope: BackupScope,
    #[serde(default = "default_true")]
    pub update_links: bool,
    /// Leave images that already sit in their destination folder alone
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default = "default_suffix_attempts")]
    pub max_suffix_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VaultConfig {
    #[serde(default = "default_note_extensions")]
    pub note_extensions: Vec<String>,
    /// Glob patterns (relative to the vault root) excluded from indexing
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_vision_prompt")]
    pub vision: String,
    #[serde(default = "default_text_prompt")]
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON Lines run journal; `null` disables it
    #[serde(default = "default_journal")]
    pub journal: Option<PathBuf>,
}

// Default value functions
fn default_provider() -> ProviderKind { ProviderKind::OpenAi }
fn default_max_tokens() -> u32 { 150 }
fn default_temperature() -> f32 { 0.3 }
fn default_timeout() -> u64 { 30 }
fn default_retries() -> u32 { 2 }
fn default_retry_base_ms() -> u64 { 1000 }
fn default_concurrency() -> usize { 4 }
fn default_max_size_mb() -> u64 { 10 }
fn default_context_chars() -> usize { 200 }
fn default_max_dimension() -> u32 { 1024 }
fn default_true() -> bool { true }
fn default_max_length() -> usize { 50 }
fn default_replace_spaces() -> String { "_".to_string() }
fn default_max_keywords() -> usize { 3 }
fn default_backup_suffix() -> String { "_backup".to_string() }
fn default_backup_scope() -> BackupScope { BackupScope::Full }
fn default_suffix_attempts() -> u32 { 1000 }
fn default_log_level() -> String { "info".to_string() }
fn default_journal() -> Option<PathBuf> { Some(PathBuf::from("vaultkeeper_journal.jsonl")) }

fn default_formats() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_note_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

fn default_chain() -> Vec<StrategyKind> {
    vec![
        StrategyKind::AiVision,
        StrategyKind::AiText,
        StrategyKind::ContextKeywords,
        StrategyKind::OriginalFilename,
    ]
}

fn default_vision_prompt() -> String {
    "Suggest a short filename for this image: one noun phrase of at most 6 words \
     describing what the whole image shows. No file extension, no format words such \
     as png or jpg, no explanation. Return ONLY the name.\n\n\
     Text of the note around the image:\n{context}".to_string()
}

fn default_text_prompt() -> String {
    "A note embeds an image at the marked position. Based only on the surrounding \
     text, suggest a short filename for that image: one noun phrase of at most 6 words. \
     No file extension, no explanation. Return ONLY the name.\n\n\
     Context:\n{context}".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            api_key_file: None,
            base_url: None,
            models: ModelConfig::default(),
            vision: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            retry_base_ms: default_retry_base_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            supported_formats: default_formats(),
            max_size_mb: default_max_size_mb(),
            context_chars: default_context_chars(),
            max_dimension: default_max_dimension(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            use_ai: true,
            chain: default_chain(),
            max_length: default_max_length(),
            remove_special_chars: true,
            replace_spaces: default_replace_spaces(),
            max_keywords: default_max_keywords(),
        }
    }
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            create_backup: true,
            backup_suffix: default_backup_suffix(),
            backup_scope: default_backup_scope(),
            update_links: true,
            skip_existing: true,
            max_suffix_attempts: default_suffix_attempts(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            note_extensions: default_note_extensions(),
            exclude: Vec::new(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            vision: default_vision_prompt(),
            text: default_text_prompt(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            journal: default_journal(),
        }
    }
}

impl AiConfig {
    /// Base URL of the provider endpoint, honouring per-provider presets
    pub fn endpoint(&self) -> String {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            ProviderKind::Ecnu => "https://chat.ecnu.edu.cn/open/api/v1".to_string(),
            ProviderKind::Ollama => "http://localhost:11434".to_string(),
            ProviderKind::OpenAi | ProviderKind::None => "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn vision_model(&self) -> String {
        match (&self.models.vision, self.provider) {
            (Some(model), _) => model.clone(),
            (None, ProviderKind::Ecnu) => "ecnu-vl".to_string(),
            (None, ProviderKind::Ollama) => "moondream".to_string(),
            (None, _) => "gpt-4o-mini".to_string(),
        }
    }

    pub fn text_model(&self) -> String {
        match (&self.models.text, self.provider) {
            (Some(model), _) => model.clone(),
            (None, ProviderKind::Ecnu) => "ecnu-max".to_string(),
            (None, ProviderKind::Ollama) => "llama3.2:3b".to_string(),
            (None, _) => self.vision_model(),
        }
    }

    /// Whether the configured vision model accepts image input
    pub fn supports_vision(&self) -> bool {
        if let Some(explicit) = self.vision {
            return explicit;
        }
        match self.provider {
            ProviderKind::Ecnu => self.vision_model() == "ecnu-vl",
            ProviderKind::OpenAi | ProviderKind::Ollama => true,
            ProviderKind::None => false,
        }
    }

    /// Resolve the API key: explicit value, then environment, then key file
    pub fn resolve_api_key(&self) -> Option<String> {
        let explicit = self.api_key.trim();
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }
        for var in ["OPENAI_API_KEY", "ECNU_API_KEY"] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }
        let path = self.api_key_file.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => Some(content.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read API key file {:?}: {}", path, e);
                None
            }
        }
    }
}

impl ImageConfig {
    /// Whether `ext` (without dot) is a supported image extension
    pub fn is_supported(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.supported_formats
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

impl VaultConfig {
    pub fn is_note(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.note_extensions.iter().any(|n| n.trim_start_matches('.').eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::VaultkeeperError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply environment overrides for model and endpoint
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("AI_MODEL") {
            if !model.trim().is_empty() {
                self.ai.models.vision = Some(model.trim().to_string());
            }
        }
        if let Ok(url) = std::env::var("AI_BASE_URL") {
            if !url.trim().is_empty() {
                self.ai.base_url = Some(url.trim().to_string());
            }
        }
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.naming.max_length == 0 {
            return Err(crate::VaultkeeperError::Config("naming.max_length must be positive".into()));
        }
        if self.ai.concurrency == 0 {
            return Err(crate::VaultkeeperError::Config("ai.concurrency must be at least 1".into()));
        }
        if self.image.supported_formats.is_empty() {
            return Err(crate::VaultkeeperError::Config("image.supported_formats is empty".into()));
        }
        if self.naming.replace_spaces.chars().any(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(crate::VaultkeeperError::Config(
                "naming.replace_spaces may not contain path separators".into(),
            ));
        }
        for pattern in &self.vault.exclude {
            glob::Pattern::new(pattern)?;
        }
        Ok(())
    }
}
